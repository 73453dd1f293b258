mod tests_query_matching;
