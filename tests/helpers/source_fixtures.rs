//! Common Wren sources for tests.

pub const STATEMENTS: &str = r#"var a = 1
var b = a + 2
print(b)
"#;

pub const CONTROL_FLOW: &str = r#"var total = 0
for (i in range(10)) {
    if (i > 5) break
    total = total + i
}
while (total > 0) total = total - 1
return total
"#;

pub const WITH_COMMENTS: &str = r#"// leading comment
var a = 1 /* inline /* nested */ comment */
/* trailing */
"#;

/// Three statements where only the middle one contains an error
pub const ERROR_IN_MIDDLE: &str = "var a = 1\nvar b = 2 @\nvar c = 3";

/// `count` numbered var statements, one per line
pub fn numbered_statements(count: usize) -> String {
    (0..count).map(|i| format!("var v{i} = {i}\n")).collect()
}
