use super::*;

#[test]
fn test_normalize_merges_adjacent_ranges() {
    let Pattern::Chars { ranges, .. } = Pattern::chars(&[('d', 'f'), ('a', 'c'), ('x', 'x')])
    else {
        panic!("expected a character class");
    };
    assert_eq!(ranges, vec![('a', 'f'), ('x', 'x')]);
}

#[test]
fn test_nullable_patterns() {
    assert!(Pattern::repeat(Pattern::char('a')).is_nullable());
    assert!(!Pattern::repeat1(Pattern::char('a')).is_nullable());
    assert!(Pattern::seq([Pattern::optional(Pattern::char('a'))]).is_nullable());
    assert!(!Pattern::literal("ab").is_nullable());
}

#[test]
fn test_literal_compiles_to_chain() {
    let mut nfa = NfaBuilder::default();
    let start = nfa.add_token(Symbol(1), &Pattern::literal("ab"));
    assert_eq!(nfa.nodes.len(), 3);
    assert!(matches!(
        &nfa.nodes[start as usize],
        LexNode::Chars { ranges, .. } if ranges == &vec![('a', 'a')]
    ));
}

#[test]
fn test_identifier_pattern_matches_whole_words_only() {
    let identifier = Pattern::seq([
        Pattern::chars(&[('a', 'z'), ('_', '_')]),
        Pattern::repeat(Pattern::chars(&[('a', 'z'), ('0', '9'), ('_', '_')])),
    ]);
    assert!(identifier.matches("while"));
    assert!(identifier.matches("x1"));
    assert!(!identifier.matches("1x"));
    assert!(!identifier.matches("=="));
    assert!(!identifier.matches(""));
}

#[test]
fn test_matches_handles_nested_repetition_and_choice() {
    let pattern = Pattern::repeat1(Pattern::choice([Pattern::literal("ab"), Pattern::char('c')]));
    assert!(pattern.matches("abcab"));
    assert!(pattern.matches("c"));
    assert!(!pattern.matches("abb"));
    assert!(Pattern::optional(Pattern::char('x')).matches(""));
}
