mod tests_grammar_blob;
