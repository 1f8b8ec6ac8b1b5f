use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, tag, tag_no_case};
use nom::character::complete::{char, digit1, multispace0, none_of};
use nom::combinator::{map, opt, recognize, value};
use nom::multi::{fold_many0, many0_count};
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

use super::{Expr, Literal, Op};

pub fn parse(input: &str) -> Result<Expr, String> {
	match delimited(multispace0, parse_or, multispace0)(input) {
		Ok((remaining, expr)) if remaining.is_empty() => Ok(expr),
		Ok((remaining, _)) => Err(format!("unexpected trailing input: `{remaining}`")),
		Err(e) => Err(e.to_string()),
	}
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
	F: FnMut(&'a str) -> IResult<&'a str, O>,
{
	delimited(multispace0, inner, multispace0)
}

fn parse_or(input: &str) -> IResult<&str, Expr> {
	let (input, first) = parse_and(input)?;
	fold_many0(preceded(ws(tag_no_case("or")), parse_and), move || first.clone(), |acc, next| Expr::Or(Box::new(acc), Box::new(next)))(input)
}

fn parse_and(input: &str) -> IResult<&str, Expr> {
	let (input, first) = parse_not(input)?;
	fold_many0(preceded(ws(tag_no_case("and")), parse_not), move || first.clone(), |acc, next| Expr::And(Box::new(acc), Box::new(next)))(input)
}

fn parse_not(input: &str) -> IResult<&str, Expr> {
	alt((map(preceded(pair(not_keyword, multispace0), parse_not), |inner| Expr::Not(Box::new(inner))), parse_primary))(input)
}

/// Matches the `not` keyword only at a word boundary, so identifiers like
/// `nothing` are never mis-split into `not hing`.
fn not_keyword(input: &str) -> IResult<&str, &str> {
	let (rest, matched) = tag_no_case("not")(input)?;
	if rest.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_') {
		return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
	}
	Ok((rest, matched))
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
	alt((delimited(ws(char('(')), parse_or, ws(char(')'))), parse_comparison))(input)
}

fn parse_comparison(input: &str) -> IResult<&str, Expr> {
	map(tuple((ws(identifier), ws(parse_op), ws(parse_literal))), |(name, op, literal)| Expr::Comparison { name, op, literal })(input)
}

fn identifier(input: &str) -> IResult<&str, String> {
	map(
		recognize(pair(
			alt((nom::character::complete::alpha1, tag("_"))),
			many0_count(nom::character::complete::satisfy(|c: char| c.is_alphanumeric() || c == '_' || c == '.')),
		)),
		|s: &str| s.to_string(),
	)(input)
}

fn parse_op(input: &str) -> IResult<&str, Op> {
	alt((
		value(Op::Eq, tag("==")),
		value(Op::Ne, tag("!=")),
		value(Op::Le, tag("<=")),
		value(Op::Ge, tag(">=")),
		value(Op::Lt, tag("<")),
		value(Op::Gt, tag(">")),
		value(Op::Contains, tag_no_case("contains")),
		value(Op::Matches, tag_no_case("matches")),
	))(input)
}

fn parse_literal(input: &str) -> IResult<&str, Literal> {
	alt((parse_bool, parse_number, parse_string))(input)
}

fn parse_bool(input: &str) -> IResult<&str, Literal> {
	alt((value(Literal::Bool(true), tag_no_case("true")), value(Literal::Bool(false), tag_no_case("false"))))(input)
}

fn parse_number(input: &str) -> IResult<&str, Literal> {
	map(recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1))))), |s: &str| Literal::Number(s.parse().unwrap_or(0.0)))(input)
}

fn parse_string(input: &str) -> IResult<&str, Literal> {
	map(
		delimited(char('"'), opt(escaped_transform(none_of("\\\""), '\\', alt((value("\\", tag("\\")), value("\"", tag("\"")), value("\n", tag("n")))))), char('"')),
		|s: Option<String>| Literal::String(s.unwrap_or_default()),
	)(input)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_comparison() {
		let expr = parse("status == 200").unwrap();
		assert_eq!(expr, Expr::Comparison { name: "status".into(), op: Op::Eq, literal: Literal::Number(200.0) });
	}

	#[test]
	fn parses_nested_boolean_logic() {
		let expr = parse("a == 1 and (b == 2 or not c == 3)").unwrap();
		match expr {
			Expr::And(_, _) => {}
			other => panic!("expected And, got {other:?}"),
		}
	}

	#[test]
	fn parses_string_literal_with_dotted_name() {
		let expr = parse(r#"response.body contains "ok""#).unwrap();
		assert_eq!(
			expr,
			Expr::Comparison { name: "response.body".into(), op: Op::Contains, literal: Literal::String("ok".into()) }
		);
	}
}
