//! Script evaluation.
//!
//! Scripts are sequences of commands separated by newlines or semicolons.
//! Words are split on whitespace. `{...}` words are literal, `"..."` and bare
//! words undergo `$var`, `[script]` and backslash substitution. A word that
//! consists of exactly one substitution yields the substituted value itself,
//! so native values pass between commands without a round trip through text.

use crate::error::TclError;
use crate::interp::Interp;
use crate::list;
use crate::obj::Obj;

#[derive(Debug, Clone, PartialEq)]
enum Part {
    Literal(String),
    Var(String),
    Script(String),
}

type Word = Vec<Part>;

impl Interp {
    /// Evaluate a script and return the result of its last command.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn eval(&self, script: &str) -> Result<Obj, TclError> {
        let _guard = self.enter()?;
        let commands = parse_script(script)?;

        let mut last = Obj::new();
        for words in commands {
            let mut objv = Vec::with_capacity(words.len());
            for word in &words {
                objv.push(self.substitute(word)?);
            }
            if objv.is_empty() {
                continue;
            }
            last = self.invoke(&objv)?;
        }
        self.set_result(last.clone());
        Ok(last)
    }

    fn substitute(&self, word: &Word) -> Result<Obj, TclError> {
        if let [single] = word.as_slice() {
            return self.substitute_part(single);
        }
        let mut text = String::new();
        for part in word {
            match part {
                Part::Literal(s) => text.push_str(s),
                other => text.push_str(&self.substitute_part(other)?.as_rc_str()),
            }
        }
        Ok(Obj::from(text))
    }

    fn substitute_part(&self, part: &Part) -> Result<Obj, TclError> {
        match part {
            Part::Literal(s) => Ok(Obj::from(s.as_str())),
            Part::Var(name) => self.get_var(name),
            Part::Script(script) => self.eval(script),
        }
    }
}

fn parse_script(script: &str) -> Result<Vec<Vec<Word>>, TclError> {
    let chars: Vec<char> = script.chars().collect();
    let mut commands = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && (chars[i].is_whitespace() || chars[i] == ';') {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        if chars[i] == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        let mut words = Vec::new();
        loop {
            while i < chars.len() && matches!(chars[i], ' ' | '\t' | '\r') {
                i += 1;
            }
            if i + 1 < chars.len() && chars[i] == '\\' && chars[i + 1] == '\n' {
                i += 2;
                continue;
            }
            if i >= chars.len() || chars[i] == '\n' || chars[i] == ';' {
                break;
            }
            let (word, next) = parse_word(&chars, i)?;
            words.push(word);
            i = next;
        }
        commands.push(words);
    }

    Ok(commands)
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ';'
}

fn parse_word(chars: &[char], start: usize) -> Result<(Word, usize), TclError> {
    match chars[start] {
        '{' => {
            let (text, next) = list::parse_braced(chars, start)
                .map_err(|_| TclError::script("missing close-brace"))?;
            if next < chars.len() && !is_separator(chars[next]) {
                return Err(TclError::script("extra characters after close-brace"));
            }
            Ok((vec![Part::Literal(text)], next))
        }
        '"' => {
            let (word, next) = parse_parts(chars, start + 1, |c| c == '"')?;
            if next >= chars.len() {
                return Err(TclError::script("missing \""));
            }
            let next = next + 1;
            if next < chars.len() && !is_separator(chars[next]) {
                return Err(TclError::script("extra characters after close-quote"));
            }
            Ok((word, next))
        }
        _ => parse_parts(chars, start, is_separator),
    }
}

/// Collect substitution parts until `stop` matches (the stop character is
/// not consumed).
fn parse_parts(
    chars: &[char],
    start: usize,
    stop: impl Fn(char) -> bool,
) -> Result<(Word, usize), TclError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = start;

    let flush = |literal: &mut String, parts: &mut Vec<Part>| {
        if !literal.is_empty() {
            parts.push(Part::Literal(std::mem::take(literal)));
        }
    };

    while i < chars.len() && !stop(chars[i]) {
        match chars[i] {
            '\\' => i = list::backslash(chars, i, &mut literal),
            '$' => {
                let (name, next) = parse_var_name(chars, i + 1)?;
                match name {
                    Some(name) => {
                        flush(&mut literal, &mut parts);
                        parts.push(Part::Var(name));
                    }
                    None => literal.push('$'),
                }
                i = next;
            }
            '[' => {
                let end = find_close_bracket(chars, i + 1)?;
                flush(&mut literal, &mut parts);
                parts.push(Part::Script(chars[i + 1..end].iter().collect()));
                i = end + 1;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    flush(&mut literal, &mut parts);
    if parts.is_empty() {
        parts.push(Part::Literal(String::new()));
    }
    Ok((parts, i))
}

fn parse_var_name(chars: &[char], start: usize) -> Result<(Option<String>, usize), TclError> {
    if chars.get(start) == Some(&'{') {
        let mut i = start + 1;
        while i < chars.len() && chars[i] != '}' {
            i += 1;
        }
        if i >= chars.len() {
            return Err(TclError::script("missing close-brace for variable name"));
        }
        return Ok((Some(chars[start + 1..i].iter().collect()), i + 1));
    }

    let mut i = start;
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == ':') {
        i += 1;
    }
    if i == start {
        return Ok((None, start));
    }
    Ok((Some(chars[start..i].iter().collect()), i))
}

fn find_close_bracket(chars: &[char], start: usize) -> Result<usize, TclError> {
    let mut depth = 1usize;
    let mut braces = 0usize;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '{' => braces += 1,
            '}' => braces = braces.saturating_sub(1),
            '[' if braces == 0 => depth += 1,
            ']' if braces == 0 => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(TclError::script("missing close-bracket"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_commands_and_words() {
        let cmds = parse_script("set a 1; set b {x y}\n# comment\nlist a").unwrap();
        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[1][2], vec![Part::Literal("x y".into())]);
    }

    #[test]
    fn substitution_parts() {
        let cmds = parse_script("puts \"a $b [c d] \\t\"").unwrap();
        let word = &cmds[0][1];
        assert_eq!(
            word,
            &vec![
                Part::Literal("a ".into()),
                Part::Var("b".into()),
                Part::Literal(" ".into()),
                Part::Script("c d".into()),
                Part::Literal(" \t".into()),
            ]
        );
    }

    #[test]
    fn lone_dollar_is_literal() {
        let cmds = parse_script("x $ a$").unwrap();
        assert_eq!(cmds[0][1], vec![Part::Literal("$".into())]);
        assert_eq!(cmds[0][2], vec![Part::Literal("a$".into())]);
    }

    #[test]
    fn syntax_errors() {
        assert!(parse_script("x {a").is_err());
        assert!(parse_script("x [a").is_err());
        assert!(parse_script("x \"a").is_err());
        assert!(parse_script("x {a}b").is_err());
    }

    #[test]
    fn eval_nested() {
        let interp = Interp::new();
        interp.eval("set a 5; set b [set a]").unwrap();
        assert_eq!(interp.get_var("b").unwrap().as_string(), "5");
        let out = interp.eval("list $a \"$b!\" {$a}").unwrap();
        assert_eq!(out.as_string(), "5 5! {$a}");
    }

    #[test]
    fn unknown_command() {
        let interp = Interp::new();
        let err = interp.eval("frobnicate 1").unwrap_err();
        assert!(matches!(err, TclError::NoSuchCommand { .. }));
    }

    #[test]
    fn nesting_limit() {
        use crate::property::InterpProperty;

        let interp = Interp::new();
        interp.set_property(InterpProperty::MaxNestingDepth, 3);
        assert!(interp.eval("set a [set b [set c 1]]").is_ok());
        let err = interp.eval("set a [set b [set c [set d 1]]]").unwrap_err();
        assert_eq!(err, TclError::NestingTooDeep);
        assert_eq!(interp.depth(), 0);
    }
}
