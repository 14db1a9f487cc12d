//! Recipe Files
//!
//! A recipe lists the passes one compilation session applies, in order,
//! together with the parameters each pass was configured with. The text
//! format is shared with existing tooling and round-trips exactly: writing
//! a parsed recipe and parsing it again reproduces the same entries.
//!
//! ```text
//! !typed-ssa v2
//! # tighten validation while debugging
//! ValidateSsaPass: strict=true, max_reported=8
//! DumpSsaPass: label="after validation", format=VerboseFormat
//! ```
//!
//! Values are signed integers, `true`/`false`, `<null>`, `<empty>`, quoted
//! strings, or bare class references checked against the pass's declared
//! parameter table. The writer quotes every string and escapes control
//! characters and non-ASCII as `\uXXXX`, using surrogate pairs beyond the
//! BMP, so recipe files stay plain ASCII.

use crate::passes::registry::{ParamKind, PassRegistry};
use crate::passes::Pass;
use indexmap::IndexMap;
use std::fmt;
use std::fmt::Write as _;
use std::iter::Peekable;
use std::rc::Rc;
use std::str::Chars;

/// Version string expected on the `!` line
pub const RECIPE_VERSION: &str = "typed-ssa v2";

/// Parameter values as a pass line retains them
pub type ParamMap = IndexMap<String, RecipeValue>;

/// One parameter value from a recipe line
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeValue {
    Int(i64),
    Bool(bool),
    Str(String),
    /// Explicit `<null>`
    Null,
    /// Explicit `<empty>`, an absent optional
    Empty,
    /// Bare name resolved by the pass's factory
    ClassRef(String),
}

impl RecipeValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RecipeValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RecipeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RecipeValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&str> {
        match self {
            RecipeValue::ClassRef(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RecipeValue::Null | RecipeValue::Empty)
    }

    /// True when this value is acceptable for a parameter of `kind`.
    /// `<null>` and `<empty>` are acceptable everywhere.
    pub fn matches(&self, kind: ParamKind) -> bool {
        match (self, kind) {
            (RecipeValue::Null | RecipeValue::Empty, _) => true,
            (RecipeValue::Int(_), ParamKind::Int) => true,
            (RecipeValue::Bool(_), ParamKind::Bool) => true,
            (RecipeValue::Str(_), ParamKind::Str) => true,
            (RecipeValue::ClassRef(_), ParamKind::Class) => true,
            _ => false,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            RecipeValue::Int(_) => "an integer",
            RecipeValue::Bool(_) => "a boolean",
            RecipeValue::Str(_) => "a string",
            RecipeValue::Null => "<null>",
            RecipeValue::Empty => "<empty>",
            RecipeValue::ClassRef(_) => "a class reference",
        }
    }
}

impl fmt::Display for RecipeValue {
    /// Renders the value exactly as the writer emits it
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeValue::Int(value) => write!(f, "{}", value),
            RecipeValue::Bool(value) => write!(f, "{}", value),
            RecipeValue::Null => write!(f, "<null>"),
            RecipeValue::Empty => write!(f, "<empty>"),
            RecipeValue::ClassRef(name) => write!(f, "{}", name),
            RecipeValue::Str(value) => {
                f.write_str("\"")?;
                for c in value.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        c if (c as u32) < 0x20 || (c as u32) > 0x7E => {
                            let code = c as u32;
                            if code <= 0xFFFF {
                                write!(f, "\\u{:04X}", code)?;
                            } else {
                                let v = code - 0x10000;
                                write!(f, "\\u{:04X}", 0xD800 + (v >> 10))?;
                                write!(f, "\\u{:04X}", 0xDC00 + (v & 0x3FF))?;
                            }
                        }
                        c => f.write_char(c)?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

/// Failure to load or construct a recipe. All of these abort the session.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeError {
    MissingVersion,
    VersionMismatch { found: String },
    UnknownPass { line: usize, name: String },
    UnknownParameter {
        line: usize,
        pass: String,
        name: String,
        valid: Vec<String>,
    },
    WrongKind {
        line: usize,
        pass: String,
        name: String,
        expected: ParamKind,
        found: &'static str,
    },
    UnterminatedString { line: usize },
    MalformedValue { line: usize, value: String },
    Syntax { line: usize, detail: String },
    Construction {
        line: usize,
        pass: String,
        detail: String,
    },
}

impl fmt::Display for RecipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeError::MissingVersion => {
                write!(f, "recipe is missing its `!{}` version line", RECIPE_VERSION)
            }
            RecipeError::VersionMismatch { found } => write!(
                f,
                "recipe version `{}` does not match expected `{}`",
                found, RECIPE_VERSION
            ),
            RecipeError::UnknownPass { line, name } => {
                write!(f, "line {}: unknown pass `{}`", line, name)
            }
            RecipeError::UnknownParameter {
                line,
                pass,
                name,
                valid,
            } => {
                write!(f, "line {}: pass `{}` has no parameter `{}`", line, pass, name)?;
                if valid.is_empty() {
                    write!(f, " (it takes no parameters)")
                } else {
                    write!(f, " (valid parameters: {})", valid.join(", "))
                }
            }
            RecipeError::WrongKind {
                line,
                pass,
                name,
                expected,
                found,
            } => write!(
                f,
                "line {}: parameter `{}` of `{}` expects {}, got {}",
                line, name, pass, expected, found
            ),
            RecipeError::UnterminatedString { line } => {
                write!(f, "line {}: unterminated string", line)
            }
            RecipeError::MalformedValue { line, value } => {
                write!(f, "line {}: malformed value `{}`", line, value)
            }
            RecipeError::Syntax { line, detail } => write!(f, "line {}: {}", line, detail),
            RecipeError::Construction { line, pass, detail } => {
                write!(f, "line {}: cannot construct `{}`: {}", line, pass, detail)
            }
        }
    }
}

impl std::error::Error for RecipeError {}

/// One pass line: the pass itself plus the parameters it was built from
pub struct RecipeEntry {
    name: String,
    params: ParamMap,
    pass: Rc<dyn Pass>,
}

impl RecipeEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    pub fn pass(&self) -> &dyn Pass {
        self.pass.as_ref()
    }
}

impl fmt::Debug for RecipeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecipeEntry")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl PartialEq for RecipeEntry {
    /// Entries compare by what the text format retains
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params
    }
}

/// An immutable ordered pass list, shared read-only across one session
pub struct Recipe {
    entries: Vec<RecipeEntry>,
}

impl Recipe {
    /// Parse recipe text, constructing each named pass through `registry`
    pub fn parse(text: &str, registry: &PassRegistry) -> Result<Self, RecipeError> {
        let mut entries = Vec::new();
        let mut saw_version = false;

        for (index, raw) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(version) = line.strip_prefix('!') {
                if saw_version {
                    return Err(RecipeError::Syntax {
                        line: line_number,
                        detail: "duplicate version line".to_string(),
                    });
                }
                if version != RECIPE_VERSION {
                    return Err(RecipeError::VersionMismatch {
                        found: version.to_string(),
                    });
                }
                saw_version = true;
                continue;
            }

            if !saw_version {
                return Err(RecipeError::MissingVersion);
            }

            entries.push(parse_pass_line(line, line_number, registry)?);
        }

        if !saw_version {
            return Err(RecipeError::MissingVersion);
        }
        Ok(Self { entries })
    }

    /// Render the recipe in the canonical text form
    pub fn write(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "!{}", RECIPE_VERSION);
        for entry in &self.entries {
            if entry.params.is_empty() {
                let _ = writeln!(out, "{}", entry.name);
            } else {
                let rendered: Vec<String> = entry
                    .params
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect();
                let _ = writeln!(out, "{}: {}", entry.name, rendered.join(", "));
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RecipeEntry] {
        &self.entries
    }

    /// Panics on an index outside `[0, len)`; the driver guarantees this
    pub fn entry(&self, index: usize) -> &RecipeEntry {
        &self.entries[index]
    }

    pub fn pass(&self, index: usize) -> &dyn Pass {
        self.entries[index].pass.as_ref()
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

fn parse_pass_line(
    line: &str,
    line_number: usize,
    registry: &PassRegistry,
) -> Result<RecipeEntry, RecipeError> {
    let (name, params_text) = match line.split_once(':') {
        Some((name, rest)) => (name.trim(), Some(rest)),
        None => (line, None),
    };

    let descriptor = registry
        .descriptor(name)
        .ok_or_else(|| RecipeError::UnknownPass {
            line: line_number,
            name: name.to_string(),
        })?;

    let params = match params_text {
        None => ParamMap::default(),
        Some(text) => parse_params(text, line_number)?,
    };

    for (key, value) in &params {
        let kind = descriptor.parameter_kind(key).ok_or_else(|| {
            RecipeError::UnknownParameter {
                line: line_number,
                pass: descriptor.name().to_string(),
                name: key.clone(),
                valid: descriptor.parameter_names(),
            }
        })?;
        if !value.matches(kind) {
            return Err(RecipeError::WrongKind {
                line: line_number,
                pass: descriptor.name().to_string(),
                name: key.clone(),
                expected: kind,
                found: value.kind_name(),
            });
        }
    }

    let pass = descriptor
        .construct(&params)
        .map_err(|detail| RecipeError::Construction {
            line: line_number,
            pass: descriptor.name().to_string(),
            detail,
        })?;

    Ok(RecipeEntry {
        name: descriptor.name().to_string(),
        params,
        pass: Rc::from(pass),
    })
}

struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self {
            chars: text.chars().peekable(),
            line,
        }
    }

    fn syntax(&self, detail: impl Into<String>) -> RecipeError {
        RecipeError::Syntax {
            line: self.line,
            detail: detail.into(),
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while matches!(self.chars.peek(), Some(c) if pred(*c)) {
            taken.push(self.chars.next().unwrap());
        }
        taken
    }

    fn hex4(&mut self) -> Result<u32, RecipeError> {
        let mut code = 0;
        for _ in 0..4 {
            let digit = self
                .chars
                .next()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.syntax("`\\u` escape needs four hex digits"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    /// One `\uXXXX` code unit, consuming its partner when it opens a
    /// surrogate pair
    fn unicode_escape(&mut self) -> Result<char, RecipeError> {
        let code = self.hex4()?;
        if (0xDC00..=0xDFFF).contains(&code) {
            return Err(self.syntax("unpaired low surrogate in `\\u` escape"));
        }
        if (0xD800..=0xDBFF).contains(&code) {
            if self.chars.next() != Some('\\') || self.chars.next() != Some('u') {
                return Err(self.syntax("high surrogate not followed by `\\u` escape"));
            }
            let low = self.hex4()?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(self.syntax("high surrogate not followed by a low surrogate"));
            }
            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(combined)
                .ok_or_else(|| self.syntax("invalid surrogate pair"));
        }
        char::from_u32(code).ok_or_else(|| self.syntax("invalid `\\u` escape"))
    }

    fn quoted_string(&mut self) -> Result<String, RecipeError> {
        // Opening quote already consumed by the caller.
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(RecipeError::UnterminatedString { line: self.line }),
                Some('"') => return Ok(value),
                Some('\\') => match self.chars.next() {
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('u') => value.push(self.unicode_escape()?),
                    Some(other) => {
                        return Err(self.syntax(format!("unsupported escape `\\{}`", other)))
                    }
                    None => return Err(RecipeError::UnterminatedString { line: self.line }),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn value(&mut self) -> Result<RecipeValue, RecipeError> {
        match self.chars.peek() {
            Some('"') => {
                self.chars.next();
                Ok(RecipeValue::Str(self.quoted_string()?))
            }
            Some('<') => {
                let token = self.take_while(|c| c != ',' && !c.is_whitespace());
                match token.as_str() {
                    "<null>" => Ok(RecipeValue::Null),
                    "<empty>" => Ok(RecipeValue::Empty),
                    _ => Err(RecipeError::MalformedValue {
                        line: self.line,
                        value: token,
                    }),
                }
            }
            Some(c) if *c == '-' || c.is_ascii_digit() => {
                let token = self.take_while(|c| c == '-' || c.is_ascii_digit());
                token
                    .parse::<i64>()
                    .map(RecipeValue::Int)
                    .map_err(|_| RecipeError::MalformedValue {
                        line: self.line,
                        value: token,
                    })
            }
            Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
                let token =
                    self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                match token.as_str() {
                    "true" => Ok(RecipeValue::Bool(true)),
                    "false" => Ok(RecipeValue::Bool(false)),
                    _ => Ok(RecipeValue::ClassRef(token)),
                }
            }
            _ => Err(self.syntax("expected a parameter value")),
        }
    }
}

fn parse_params(text: &str, line: usize) -> Result<ParamMap, RecipeError> {
    let mut cursor = Cursor::new(text, line);
    let mut params = ParamMap::default();
    loop {
        cursor.skip_spaces();
        let key = cursor.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if key.is_empty() {
            return Err(cursor.syntax("expected a parameter name"));
        }
        cursor.skip_spaces();
        if cursor.chars.next() != Some('=') {
            return Err(cursor.syntax(format!("expected `=` after parameter `{}`", key)));
        }
        cursor.skip_spaces();
        let value = cursor.value()?;
        if params.insert(key.clone(), value).is_some() {
            return Err(cursor.syntax(format!("duplicate parameter `{}`", key)));
        }
        cursor.skip_spaces();
        match cursor.chars.next() {
            None => return Ok(params),
            Some(',') => continue,
            Some(other) => {
                return Err(cursor.syntax(format!("unexpected `{}` after value", other)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::registry::PassRegistry;

    fn registry() -> PassRegistry {
        PassRegistry::standard()
    }

    #[test]
    fn test_parse_single_pass_with_defaults() {
        let text = "!typed-ssa v2\n# comment\nCumulativeReductionEliminationPass\n";
        let recipe = Recipe::parse(text, &registry()).unwrap();
        assert_eq!(recipe.len(), 1);
        assert_eq!(recipe.entry(0).name(), "CumulativeReductionEliminationPass");
        assert!(recipe.entry(0).params().is_empty());
        assert_eq!(recipe.pass(0).name(), "CumulativeReductionEliminationPass");
    }

    #[test]
    fn test_parse_parameters() {
        let text = "!typed-ssa v2\nValidateSsaPass: strict=false, max_reported=3\n";
        let recipe = Recipe::parse(text, &registry()).unwrap();
        let params = recipe.entry(0).params();
        assert_eq!(params.get("strict"), Some(&RecipeValue::Bool(false)));
        assert_eq!(params.get("max_reported"), Some(&RecipeValue::Int(3)));
    }

    #[test]
    fn test_parse_null_and_empty() {
        let text = "!typed-ssa v2\nValidateSsaPass: strict=<null>, max_reported=<empty>\n";
        let recipe = Recipe::parse(text, &registry()).unwrap();
        let params = recipe.entry(0).params();
        assert_eq!(params.get("strict"), Some(&RecipeValue::Null));
        assert_eq!(params.get("max_reported"), Some(&RecipeValue::Empty));
    }

    #[test]
    fn test_parse_class_reference() {
        let text = "!typed-ssa v2\nDumpSsaPass: format=VerboseFormat\n";
        let recipe = Recipe::parse(text, &registry()).unwrap();
        assert_eq!(
            recipe.entry(0).params().get("format"),
            Some(&RecipeValue::ClassRef("VerboseFormat".to_string()))
        );
    }

    #[test]
    fn test_unknown_class_reference_fails_construction() {
        let text = "!typed-ssa v2\nDumpSsaPass: format=SidewaysFormat\n";
        let err = Recipe::parse(text, &registry()).unwrap_err();
        assert!(matches!(err, RecipeError::Construction { .. }), "{:?}", err);
    }

    #[test]
    fn test_missing_version_line() {
        let err = Recipe::parse("ValidateSsaPass\n", &registry()).unwrap_err();
        assert_eq!(err, RecipeError::MissingVersion);
        let err = Recipe::parse("# only comments\n", &registry()).unwrap_err();
        assert_eq!(err, RecipeError::MissingVersion);
    }

    #[test]
    fn test_version_mismatch() {
        let err = Recipe::parse("!typed-ssa v1\n", &registry()).unwrap_err();
        assert_eq!(
            err,
            RecipeError::VersionMismatch {
                found: "typed-ssa v1".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_pass() {
        let err = Recipe::parse("!typed-ssa v2\nFrobnicatePass\n", &registry()).unwrap_err();
        assert_eq!(
            err,
            RecipeError::UnknownPass {
                line: 2,
                name: "FrobnicatePass".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_parameter_lists_valid_names() {
        let text = "!typed-ssa v2\nValidateSsaPass: strictness=true\n";
        match Recipe::parse(text, &registry()).unwrap_err() {
            RecipeError::UnknownParameter { name, valid, .. } => {
                assert_eq!(name, "strictness");
                assert!(valid.contains(&"strict".to_string()));
                assert!(valid.contains(&"max_reported".to_string()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_wrong_parameter_kind() {
        let text = "!typed-ssa v2\nValidateSsaPass: strict=3\n";
        match Recipe::parse(text, &registry()).unwrap_err() {
            RecipeError::WrongKind { name, found, .. } => {
                assert_eq!(name, "strict");
                assert_eq!(found, "an integer");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_string() {
        let text = "!typed-ssa v2\nDumpSsaPass: label=\"oops\n";
        assert_eq!(
            Recipe::parse(text, &registry()).unwrap_err(),
            RecipeError::UnterminatedString { line: 2 }
        );
    }

    #[test]
    fn test_empty_parameter_list_after_colon() {
        let text = "!typed-ssa v2\nValidateSsaPass:\n";
        assert!(matches!(
            Recipe::parse(text, &registry()).unwrap_err(),
            RecipeError::Syntax { line: 2, .. }
        ));
    }

    #[test]
    fn test_string_escapes() {
        let text = "!typed-ssa v2\nDumpSsaPass: label=\"a\\\"b\\\\c\\nd\\u00FC\\uD83D\\uDE00\"\n";
        let recipe = Recipe::parse(text, &registry()).unwrap();
        assert_eq!(
            recipe.entry(0).params().get("label"),
            Some(&RecipeValue::Str("a\"b\\c\nd\u{FC}\u{1F600}".to_string()))
        );
    }

    #[test]
    fn test_writer_escapes_strings() {
        let value = RecipeValue::Str("a\"b\\c\nd\u{FC}\u{1F600}".to_string());
        assert_eq!(value.to_string(), "\"a\\\"b\\\\c\\nd\\u00FC\\uD83D\\uDE00\"");
    }

    #[test]
    fn test_unpaired_surrogate_rejected() {
        let text = "!typed-ssa v2\nDumpSsaPass: label=\"\\uD83D\"\n";
        assert!(matches!(
            Recipe::parse(text, &registry()).unwrap_err(),
            RecipeError::Syntax { .. }
        ));
    }

    #[test]
    fn test_round_trip() {
        let text = concat!(
            "!typed-ssa v2\n",
            "SumEliminationPass\n",
            "ValidateSsaPass: strict=true, max_reported=-1\n",
            "DumpSsaPass: label=\"quote \\\" newline \\n unicode \\u00E9 \\uD83D\\uDE80\", ",
            "format=CompactFormat\n",
            "ValidateSsaPass: strict=<null>, max_reported=<empty>\n",
        );
        let registry = registry();
        let first = Recipe::parse(text, &registry).unwrap();
        let written = first.write();
        let second = Recipe::parse(&written, &registry).unwrap();
        assert_eq!(first.entries(), second.entries());
        // The canonical form is a fixed point of write-then-parse.
        assert_eq!(written, second.write());
    }
}
