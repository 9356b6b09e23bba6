//! Lenient markup tokenizer
//!
//! Event-level nom parsers feeding a tree builder. Parsing never fails:
//! anything that does not scan as a tag is kept as verbatim text, which is
//! what lets template expressions and stray angle brackets round-trip.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_till1, take_until, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, opt, recognize},
    multi::many0,
    sequence::{delimited, preceded, tuple},
    IResult,
};

use super::{Document, NodeId};

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    /// Comments and doctypes, preserved verbatim as text nodes.
    Raw(&'a str),
    Open {
        tag: &'a str,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(&'a str),
}

/// Parse `input` as a fragment and append the resulting nodes under
/// `parent`.
pub(super) fn parse_into(doc: &mut Document, parent: NodeId, input: &str) {
    let mut stack: Vec<NodeId> = vec![parent];
    let mut rest = input;
    while !rest.is_empty() {
        let top = *stack.last().unwrap_or(&parent);
        let (next, tok) = match token(rest) {
            Ok(ok) => ok,
            Err(_) => {
                let id = doc.new_text(rest);
                doc.append(top, id);
                break;
            }
        };
        rest = next;
        match tok {
            Token::Text(t) | Token::Raw(t) => {
                let id = doc.new_text(t);
                doc.append(top, id);
            }
            Token::Open {
                tag,
                attrs,
                self_closing,
            } => {
                let id = doc.new_element(tag, attrs);
                doc.append(top, id);
                if !self_closing && !super::is_void(tag) {
                    stack.push(id);
                }
            }
            Token::Close(name) => {
                // pop to the nearest matching open; never past the fragment
                // parent, and ignore closes that match nothing
                if let Some(idx) = stack.iter().rposition(|&id| {
                    doc.tag(id)
                        .map(|t| t.eq_ignore_ascii_case(name))
                        .unwrap_or(false)
                }) {
                    if idx >= 1 {
                        stack.truncate(idx);
                    }
                }
            }
        }
    }
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((comment, doctype, close_tag, open_tag, text, stray_angle))(input)
}

fn text(input: &str) -> IResult<&str, Token> {
    map(take_till1(|c| c == '<'), Token::Text)(input)
}

/// A `<` that opens nothing parseable stays literal text.
fn stray_angle(input: &str) -> IResult<&str, Token> {
    map(tag("<"), Token::Text)(input)
}

fn comment(input: &str) -> IResult<&str, Token> {
    map(
        recognize(tuple((tag("<!--"), take_until("-->"), tag("-->")))),
        Token::Raw,
    )(input)
}

fn doctype(input: &str) -> IResult<&str, Token> {
    map(
        recognize(tuple((tag("<!"), take_till(|c| c == '>'), char('>')))),
        Token::Raw,
    )(input)
}

fn tag_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')(input)
}

fn close_tag(input: &str) -> IResult<&str, Token> {
    map(
        delimited(tag("</"), tag_name, preceded(multispace0, char('>'))),
        Token::Close,
    )(input)
}

fn open_tag(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('<')(input)?;
    let (input, name) = tag_name(input)?;
    let (input, attrs) = many0(preceded(multispace1, attribute))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, slash) = opt(char('/'))(input)?;
    let (input, _) = char('>')(input)?;
    Ok((
        input,
        Token::Open {
            tag: name,
            attrs,
            self_closing: slash.is_some(),
        },
    ))
}

fn attribute(input: &str) -> IResult<&str, (String, String)> {
    let (input, name) = attr_name(input)?;
    let (input, value) = opt(preceded(
        tuple((multispace0, char('='), multispace0)),
        attr_value,
    ))(input)?;
    Ok((
        input,
        (name.to_string(), value.unwrap_or_default().to_string()),
    ))
}

fn attr_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || "-_:.@".contains(c))(input)
}

fn attr_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_till(|c| c == '"'), char('"')),
        delimited(char('\''), take_till(|c| c == '\''), char('\'')),
        take_till1(|c: char| c.is_whitespace() || c == '>'),
    ))(input)
}
