//! Language-agnostic source highlighting
//!
//! Notebook code cells may hold Python, R, Julia or anything else, so the
//! tokenizer only recognizes lexical shapes shared by most languages: line
//! comments, quoted strings, numbers, a small set of common keywords,
//! call-position identifiers and punctuation. Concatenating the token texts
//! always reproduces the input exactly.

/// Lexical class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Comment,
    String,
    Number,
    Keyword,
    Function,
    Identifier,
    Punctuation,
    Whitespace,
}

impl TokenKind {
    /// CSS class used by the HTML renderer
    pub fn css_class(self) -> &'static str {
        match self {
            TokenKind::Comment => "tok-comment",
            TokenKind::String => "tok-string",
            TokenKind::Number => "tok-number",
            TokenKind::Keyword => "tok-keyword",
            TokenKind::Function => "tok-function",
            TokenKind::Identifier => "tok-ident",
            TokenKind::Punctuation => "tok-punct",
            TokenKind::Whitespace => "tok-ws",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

const KEYWORDS: &[&str] = &[
    "and", "as", "async", "await", "break", "class", "const", "continue", "def", "elif", "else",
    "false", "False", "fn", "for", "from", "function", "if", "import", "in", "is", "lambda", "let",
    "library", "local", "not", "null", "None", "or", "pass", "raise", "return", "struct", "true",
    "True", "try", "except", "finally", "use", "var", "while", "with", "yield",
];

/// Split source text into highlighted tokens
pub fn tokenize(source: &str) -> Vec<Token> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map(|(b, _)| *b).unwrap_or(source.len());
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i].1;
        let start = i;

        let kind = if c == '#' || (c == '/' && matches!(chars.get(i + 1), Some((_, '/')))) {
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
            TokenKind::Comment
        } else if c == '"' || c == '\'' {
            i += 1;
            while i < chars.len() {
                match chars[i].1 {
                    '\\' => i += 2,
                    '\n' => break,
                    ch if ch == c => {
                        i += 1;
                        break;
                    }
                    _ => i += 1,
                }
            }
            i = i.min(chars.len());
            TokenKind::String
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '.' || chars[i].1 == '_') {
                i += 1;
            }
            TokenKind::Number
        } else if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let word = &source[byte_at(start)..byte_at(i)];
            if KEYWORDS.contains(&word) {
                TokenKind::Keyword
            } else if matches!(chars.get(i), Some((_, '('))) {
                TokenKind::Function
            } else {
                TokenKind::Identifier
            }
        } else if c.is_whitespace() {
            while i < chars.len() && chars[i].1.is_whitespace() {
                i += 1;
            }
            TokenKind::Whitespace
        } else {
            i += 1;
            TokenKind::Punctuation
        };

        let text = &source[byte_at(start)..byte_at(i)];
        let merge = kind == TokenKind::Punctuation
            && matches!(tokens.last(), Some(Token { kind: TokenKind::Punctuation, .. }));
        if merge {
            if let Some(last) = tokens.last_mut() {
                last.text.push_str(text);
            }
        } else {
            tokens.push(Token {
                kind,
                text: text.to_string(),
            });
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_tokens_reproduce_source() {
        let source = "import numpy as np\n# load ✓\ndf = pd.read_csv('a\\'b.csv')  // x\nprint(3.14e2)\n";
        let joined: String = tokenize(source).into_iter().map(|t| t.text).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_python_line() {
        let toks = kinds("print('Environment ready!')  # done");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Function, "print".to_string()),
                (TokenKind::Punctuation, "(".to_string()),
                (TokenKind::String, "'Environment ready!'".to_string()),
                (TokenKind::Punctuation, ")".to_string()),
                (TokenKind::Comment, "# done".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords_and_numbers() {
        let toks = kinds("for i in range(10):");
        assert_eq!(toks[0], (TokenKind::Keyword, "for".to_string()));
        assert_eq!(toks[1], (TokenKind::Identifier, "i".to_string()));
        assert_eq!(toks[2], (TokenKind::Keyword, "in".to_string()));
        assert_eq!(toks[3], (TokenKind::Function, "range".to_string()));
        assert_eq!(toks[5], (TokenKind::Number, "10".to_string()));
    }

    #[test]
    fn test_unterminated_string_stops_at_newline() {
        let toks = tokenize("x = 'open\ny");
        assert!(toks.iter().any(|t| t.kind == TokenKind::String && t.text == "'open"));
        assert_eq!(toks.last().unwrap().text, "y");
    }

    #[test]
    fn test_trailing_escape_does_not_overrun() {
        let joined: String = tokenize("'abc\\").into_iter().map(|t| t.text).collect();
        assert_eq!(joined, "'abc\\");
    }
}
