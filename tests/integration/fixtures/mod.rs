// Test fixtures with known texts and expected outputs
// WHY: Golden-file testing requires deterministic input/output pairs for validation

/// Simple single-line text with clear sentence boundaries
pub const SIMPLE_TEXT: &str = "Hello world. This is a test. How are you?";

/// Expected sentence output for SIMPLE_TEXT
/// Format: index<TAB>sentence<TAB>(start_line,start_col,end_line,end_col)
pub const SIMPLE_EXPECTED: &str = r#"0	Hello world.	(1,1,1,12)
1	This is a test.	(1,14,1,28)
2	How are you?	(1,30,1,41)"#;

/// Text with challenging punctuation patterns
pub const PUNCTUATION_TEXT: &str = r#"Dr. Smith went to the U.S.A. yesterday. He said "Hello there!" to Mr. Jones.

She asked, "How are you?" Then he replied: "I'm fine, thanks."

This costs 10.50 in the U.K. However, it's 15.25 in the U.S."#;

/// Expected output for PUNCTUATION_TEXT with the default pipeline
/// WHY: abbreviations suppress the break after their period, even before a capital
pub const PUNCTUATION_EXPECTED: &str = r#"0	Dr. Smith went to the U.S.A. yesterday.	(1,1,1,39)
1	He said "Hello there!" to Mr. Jones.	(1,41,1,76)
2	She asked, "How are you?"	(3,1,3,25)
3	Then he replied: "I'm fine, thanks."	(3,27,3,62)
4	This costs 10.50 in the U.K. However, it's 15.25 in the U.S.	(5,1,5,60)"#;

/// Markup, an entity, a Windows line break inside a sentence and a paragraph break
pub const MARKUP_TEXT: &str = "The <b>first</b> sentence ends here. Dr. Smith arrived\r\nlate. Tom &amp; Jerry left!\n\nA new paragraph starts. It ends.";

/// Expected output for MARKUP_TEXT with MARKUP_CONFIG
/// WHY: spans and columns refer to the raw text, sentence text to the processed text
pub const MARKUP_EXPECTED: &str = r#"0	The first sentence ends here.	(1,1,1,36)
1	Dr. Smith arrived late.	(1,38,2,5)
2	Tom & Jerry left!	(2,7,2,27)
3	A new paragraph starts.	(4,1,4,23)
4	It ends.	(4,25,4,32)"#;

/// Pipeline config skipping markup and decoding `&amp;`
pub const MARKUP_CONFIG: &str = r#"
block_size = 16

[[markers]]
name = "markup"
pattern = "<[^>]+>"
actions = [{ type = "skip" }]

[[markers]]
name = "entity"
pattern = "&amp;"
actions = [{ type = "replace", replacement = "&" }]

[newlines]
paragraph_breaks = true
"#;
