//! Prompt construction for retrieval-augmented completion.
//!
//! The prompt is a single string: a role directive, six critical
//! rules, a language block chosen by substring heuristics over the
//! query, continuation examples, scope and indentation guidance, the
//! retrieved context joined by blank lines, the user's incomplete
//! code, and a `CONTINUATION:` trailer.

use std::fmt;

/// Language guessed from the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Go,
    Python,
    JavaScript,
    Java,
    CCpp,
    Unknown,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Go => "Go",
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::Java => "Java",
            Self::CCpp => "C/C++",
            Self::Unknown => "Unknown",
        };
        write!(f, "{name}")
    }
}

/// Guesses the language of a code fragment from simple substring
/// patterns, checked in a fixed order.
pub fn detect_language(code: &str) -> Language {
    let lower = code.to_lowercase();
    if lower.contains("func ") || lower.contains("package ") || lower.contains(":=") {
        Language::Go
    } else if lower.contains("def ") || lower.contains("import ") || lower.contains("elif ") {
        Language::Python
    } else if lower.contains("function ") || lower.contains("const ") || lower.contains("=>") {
        Language::JavaScript
    } else if lower.contains("public class") || lower.contains("public static") {
        Language::Java
    } else if lower.contains("#include") || lower.contains("std::") {
        Language::CCpp
    } else {
        Language::Unknown
    }
}

/// Per-language rule block for the prompt.
fn language_rules(language: Language) -> &'static str {
    match language {
        Language::Go => {
            "- Use camelCase for functions, PascalCase for types\n- Handle errors: if err != nil { return err }"
        }
        Language::Python => "- Use snake_case for names\n- Indent with 4 spaces",
        Language::JavaScript => "- Use camelCase, prefer const, complete arrow functions",
        Language::Java => "- Use PascalCase for classes, include access modifiers",
        Language::CCpp => "- Include headers, manage semicolons and pointers",
        Language::Unknown => "- Follow existing style",
    }
}

/// Builds the completion prompt from the incomplete code and the
/// retrieved context documents.
#[must_use]
pub fn build_prompt(current_code: &str, context_docs: &[String]) -> String {
    let context = context_docs.join("\n\n");
    let language = detect_language(current_code);

    format!(
        r#"You are an expert programmer. Complete the incomplete code at the cursor position.

CRITICAL RULES:
1. NEVER repeat already written code - provide ONLY the continuation from cursor position
2. Maintain exact indentation and formatting style of existing code
3. Complete logically - finish current statement/expression before starting new ones
4. Stop at natural breakpoints - don't over-complete beyond immediate need
5. Use variables/functions visible in the current scope and context
6. Return raw code only - no explanations, markdown, or comments

LANGUAGE-SPECIFIC RULES ({language}):
{rules}

CONTINUATION EXAMPLES:
-- "def calculate" → "(param1, param2):" (not "def calculate")
-- "if x ==" → " 5:" (not "if x ==")
-- "myList.app" → "end(item)" (complete method call)
-- "import " → "os" or "sys" (based on context)
-- Partial variable: "user_na" → "me" (complete identifier)

COMPLETION SCOPE GUIDANCE:
-- For partial identifiers: complete the identifier only
-- For partial statements: complete the current statement
-- For structural elements (functions/classes): provide signature + minimal body
-- For control flow: provide condition/header + first line of body
-- Stop after completing the immediate logical unit

INDENTATION RULES:
-- Match existing indentation exactly (spaces vs tabs, amount)
-- For new blocks: increase indentation by one level from parent
-- For continued lines: align with opening delimiter or use hanging indent

CONTEXT FROM SIMILAR CODE:
{context}

INCOMPLETE CODE (cursor at end):
{current_code}

CONTINUATION:"#,
        rules = language_rules(language),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(detect_language("func main() {\n\tx := 1\n}"), Language::Go);
        assert_eq!(detect_language("def handler(event):\n    pass"), Language::Python);
        assert_eq!(detect_language("const add = (a, b) => a + b"), Language::JavaScript);
        assert_eq!(detect_language("public class Main {"), Language::Java);
        assert_eq!(detect_language("#include <stdio.h>"), Language::CCpp);
        assert_eq!(detect_language("SELECT * FROM users"), Language::Unknown);
    }

    #[test]
    fn test_detection_order_prefers_go() {
        // "import " alone means Python, but ":=" wins first.
        assert_eq!(detect_language("import \"fmt\"\nx := 1"), Language::Go);
    }

    #[test]
    fn test_prompt_sections_appear_in_order() {
        let docs = vec!["fn one() {}".to_string(), "fn two() {}".to_string()];
        let prompt = build_prompt("fn ma", &docs);

        let sections = [
            "You are an expert programmer.",
            "CRITICAL RULES:",
            "LANGUAGE-SPECIFIC RULES",
            "CONTINUATION EXAMPLES:",
            "COMPLETION SCOPE GUIDANCE:",
            "INDENTATION RULES:",
            "CONTEXT FROM SIMILAR CODE:",
            "INCOMPLETE CODE (cursor at end):",
            "CONTINUATION:",
        ];
        let mut last = 0;
        for section in sections {
            let position = prompt[last..]
                .find(section)
                .unwrap_or_else(|| panic!("missing section: {section}"));
            last += position;
        }
    }

    #[test]
    fn test_prompt_ends_with_trailer() {
        let prompt = build_prompt("x", &[]);
        assert!(prompt.ends_with("CONTINUATION:"));
    }

    #[test]
    fn test_context_joined_by_blank_lines() {
        let docs = vec!["alpha".to_string(), "beta".to_string()];
        let prompt = build_prompt("x", &docs);
        assert!(prompt.contains("alpha\n\nbeta"));
    }

    #[test]
    fn test_language_block_names_detected_language() {
        let prompt = build_prompt("def f():", &[]);
        assert!(prompt.contains("LANGUAGE-SPECIFIC RULES (Python):"));
        assert!(prompt.contains("- Use snake_case for names"));
    }
}
