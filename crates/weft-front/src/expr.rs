//! Type expressions used in declaration files: `f64`, `sequence<DOMString>`,
//! `oneOf<f64, Point>?`, `ref<Tree>`.

use logos::Logos;
use miette::SourceSpan;

#[derive(Debug, Logos, PartialEq, Eq, Clone, Copy)]
enum TokenKind {
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(",")]
    Comma,
    #[token("?")]
    Question,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_.]*")]
    Ident,

    #[regex(r"[ \t\n\r]+", logos::skip)]
    Whitespace,

    #[error]
    Error,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    lexeme: &'a str,
    span: SourceSpan,
}

/// Parsed form of a type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr<'a> {
    /// A primitive or typedef name.
    Name { name: &'a str, span: SourceSpan },
    /// `name<args..>`
    Apply {
        name: &'a str,
        span: SourceSpan,
        args: Vec<TypeExpr<'a>>,
    },
    /// A trailing `?`.
    Nullable(Box<TypeExpr<'a>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError {
    pub message: String,
    pub span: SourceSpan,
}

fn lex(input: &str) -> Result<Vec<Token<'_>>, ExprError> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    while let Some(kind) = lexer.next() {
        let range = lexer.span();
        let lexeme = &input[range.clone()];
        let span = SourceSpan::new(range.start.into(), range.len());
        if kind == TokenKind::Error {
            return Err(ExprError {
                message: format!("unexpected character '{}'", lexeme),
                span,
            });
        }
        tokens.push(Token { kind, lexeme, span });
    }
    Ok(tokens)
}

/// Parses a complete type expression.
pub fn parse(input: &str) -> Result<TypeExpr<'_>, ExprError> {
    let tokens = lex(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: SourceSpan::new(input.len().into(), 0),
    };
    let expr = parser.parse_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExprError {
            message: format!("unexpected '{}' after the type", token.lexeme),
            span: token.span,
        }),
    }
}

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    end: SourceSpan,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: TokenKind, what: &str) -> Result<Token<'a>, ExprError> {
        match self.next() {
            Some(token) if token.kind == expected => Ok(token),
            Some(token) => Err(ExprError {
                message: format!("expected {}, found '{}'", what, token.lexeme),
                span: token.span,
            }),
            None => Err(ExprError {
                message: format!("expected {}, found end of input", what),
                span: self.end,
            }),
        }
    }

    // <Expr> ::= Ident ("<" <Expr> ("," <Expr>)* ">")? "?"?
    fn parse_expr(&mut self) -> Result<TypeExpr<'a>, ExprError> {
        let head = self.expect(TokenKind::Ident, "a type name")?;
        let mut expr = if self.peek().map(|t| t.kind) == Some(TokenKind::Lt) {
            self.next();
            let mut args = vec![self.parse_expr()?];
            while self.peek().map(|t| t.kind) == Some(TokenKind::Comma) {
                self.next();
                args.push(self.parse_expr()?);
            }
            self.expect(TokenKind::Gt, "',' or '>'")?;
            TypeExpr::Apply {
                name: head.lexeme,
                span: head.span,
                args,
            }
        } else {
            TypeExpr::Name {
                name: head.lexeme,
                span: head.span,
            }
        };
        if self.peek().map(|t| t.kind) == Some(TokenKind::Question) {
            self.next();
            expr = TypeExpr::Nullable(Box::new(expr));
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(expr: &TypeExpr<'_>) -> String {
        match expr {
            TypeExpr::Name { name, .. } => name.to_string(),
            TypeExpr::Apply { name, args, .. } => {
                let args: Vec<_> = args.iter().map(shape).collect();
                format!("{}[{}]", name, args.join(" "))
            }
            TypeExpr::Nullable(inner) => format!("{}?", shape(inner)),
        }
    }

    #[test]
    fn parses_nested_generics() {
        let expr = parse("oneOf<f64, sequence< DOMString >?, Point>").unwrap();
        assert_eq!(shape(&expr), "oneOf[f64 sequence[DOMString]? Point]");
    }

    #[test]
    fn native_locators_keep_dots() {
        let expr = parse("nativeEnum<std.fs.File.Mode>").unwrap();
        assert_eq!(shape(&expr), "nativeEnum[std.fs.File.Mode]");
    }

    #[test]
    fn reports_the_offending_span() {
        let err = parse("sequence<f64").unwrap_err();
        assert_eq!(err.span, SourceSpan::new(12.into(), 0));

        let err = parse("f64 f64").unwrap_err();
        assert_eq!(err.span, SourceSpan::new(4.into(), 3));

        let err = parse("record<$>").unwrap_err();
        assert!(err.message.contains("unexpected character"));
    }
}
