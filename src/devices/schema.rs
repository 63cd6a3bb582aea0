//! Capability schema
//!
//! A driver advertises its settings, signals and commands as a static
//! [`CapabilitySchema`]. The schema serializes to a line-oriented text form:
//!
//! ```text
//! [settings]
//! <name>:<type>:<rw|ro>[:<min>-<max>][:<units>]
//! [signals]
//! <name>:<type>:<rw|ro>[:<units>]
//! [commands]
//! <name>[ <args>]
//! ```
//!
//! Sections appear in that order and only when they hold at least one active
//! entry. Ranges are written with two decimals and only when `max > min`.
//! [`parse`] reads the same format back without copying.

use core::fmt;

use super::DriverError;

/// Maximum entries per section accepted by [`parse`]
pub const MAX_SCHEMA_ENTRIES: usize = 32;

/// Value type of a setting or signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ValueType {
    /// `true` / `false`
    Bool,
    /// Signed integer
    Int,
    /// Floating point
    Float,
    /// One of a fixed set of names
    Enum,
    /// Free text
    String,
    /// Edge or notification without a value
    Event,
    /// Monotonic count
    Counter,
    /// Opaque bytes
    Blob,
    /// Not specified
    Unknown,
}

impl ValueType {
    /// Lowercase wire name
    pub const fn as_str(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Enum => "enum",
            ValueType::String => "string",
            ValueType::Event => "event",
            ValueType::Counter => "counter",
            ValueType::Blob => "blob",
            ValueType::Unknown => "unknown",
        }
    }

    /// Type from its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => ValueType::Bool,
            "int" => ValueType::Int,
            "float" => ValueType::Float,
            "enum" => ValueType::Enum,
            "string" => ValueType::String,
            "event" => ValueType::Event,
            "counter" => ValueType::Counter,
            "blob" => ValueType::Blob,
            "unknown" => ValueType::Unknown,
            _ => return None,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configurable parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setting {
    pub name: &'static str,
    pub value_type: ValueType,
    pub writable: bool,
    pub units: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub active: bool,
}

impl Setting {
    /// Read-only, active, no range, no units
    pub const fn new(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            writable: false,
            units: "",
            min: 0.0,
            max: 0.0,
            step: 0.0,
            active: true,
        }
    }

    pub const fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub const fn units(mut self, units: &'static str) -> Self {
        self.units = units;
        self
    }

    pub const fn range(mut self, min: f32, max: f32, step: f32) -> Self {
        self.min = min;
        self.max = max;
        self.step = step;
        self
    }

    pub const fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Whether a numeric range is declared
    pub fn has_range(&self) -> bool {
        self.max > self.min
    }
}

/// Observable value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub name: &'static str,
    pub value_type: ValueType,
    pub writable: bool,
    pub units: &'static str,
    pub active: bool,
}

impl Signal {
    /// Read-only, active, no units
    pub const fn new(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            writable: false,
            units: "",
            active: true,
        }
    }

    pub const fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub const fn units(mut self, units: &'static str) -> Self {
        self.units = units;
        self
    }

    pub const fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Invocable action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub name: &'static str,
    /// Opaque argument description, empty for none
    pub args: &'static str,
    pub active: bool,
}

impl Command {
    pub const fn new(name: &'static str, args: &'static str) -> Self {
        Self {
            name,
            args,
            active: true,
        }
    }

    pub const fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Settings, signals and commands of one driver type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapabilitySchema {
    pub settings: &'static [Setting],
    pub signals: &'static [Signal],
    pub commands: &'static [Command],
}

impl CapabilitySchema {
    /// Active setting called `name`
    pub fn find_setting(&self, name: &str) -> Option<&'static Setting> {
        self.settings.iter().find(|s| s.active && s.name == name)
    }

    /// Active signal called `name`
    pub fn find_signal(&self, name: &str) -> Option<&'static Signal> {
        self.signals.iter().find(|s| s.active && s.name == name)
    }

    /// Active command called `name`
    pub fn find_command(&self, name: &str) -> Option<&'static Command> {
        self.commands.iter().find(|c| c.active && c.name == name)
    }

    /// Write the text form
    pub fn serialize<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        let mut settings = self.settings.iter().filter(|s| s.active).peekable();
        if settings.peek().is_some() {
            out.write_str("[settings]\n")?;
            for s in settings {
                write!(out, "{}:{}:{}", s.name, s.value_type, rw(s.writable))?;
                if s.has_range() {
                    write!(out, ":{:.2}-{:.2}", s.min, s.max)?;
                }
                if !s.units.is_empty() {
                    write!(out, ":{}", s.units)?;
                }
                out.write_char('\n')?;
            }
        }

        let mut signals = self.signals.iter().filter(|s| s.active).peekable();
        if signals.peek().is_some() {
            out.write_str("[signals]\n")?;
            for s in signals {
                write!(out, "{}:{}:{}", s.name, s.value_type, rw(s.writable))?;
                if !s.units.is_empty() {
                    write!(out, ":{}", s.units)?;
                }
                out.write_char('\n')?;
            }
        }

        let mut commands = self.commands.iter().filter(|c| c.active).peekable();
        if commands.peek().is_some() {
            out.write_str("[commands]\n")?;
            for c in commands {
                out.write_str(c.name)?;
                if !c.args.is_empty() {
                    write!(out, " {}", c.args)?;
                }
                out.write_char('\n')?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for CapabilitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.serialize(f)
    }
}

fn rw(writable: bool) -> &'static str {
    if writable {
        "rw"
    } else {
        "ro"
    }
}

/// Schema text error, `line` is 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchemaError {
    /// Header other than `[settings]`, `[signals]`, `[commands]`
    UnknownSection { line: usize },
    /// Section repeated or out of order
    SectionOrder { line: usize },
    /// Entry before any section header
    MissingSection { line: usize },
    /// Entry does not follow the line grammar
    Malformed { line: usize },
    /// Type name not recognized
    UnknownType { line: usize },
    /// More than [`MAX_SCHEMA_ENTRIES`] in one section
    TooManyEntries,
    /// Value text does not match the requested type
    InvalidValue,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownSection { line } => write!(f, "line {}: unknown section", line),
            SchemaError::SectionOrder { line } => write!(f, "line {}: section out of order", line),
            SchemaError::MissingSection { line } => {
                write!(f, "line {}: entry outside a section", line)
            }
            SchemaError::Malformed { line } => write!(f, "line {}: malformed entry", line),
            SchemaError::UnknownType { line } => write!(f, "line {}: unknown type", line),
            SchemaError::TooManyEntries => write!(f, "too many entries"),
            SchemaError::InvalidValue => write!(f, "invalid value"),
        }
    }
}

/// Setting line borrowed from schema text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedSetting<'a> {
    pub name: &'a str,
    pub value_type: ValueType,
    pub writable: bool,
    pub range: Option<(f32, f32)>,
    pub units: &'a str,
}

/// Signal line borrowed from schema text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedSignal<'a> {
    pub name: &'a str,
    pub value_type: ValueType,
    pub writable: bool,
    pub units: &'a str,
}

/// Command line borrowed from schema text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    pub name: &'a str,
    pub args: &'a str,
}

/// Schema parsed from text
#[derive(Debug, Default)]
pub struct ParsedSchema<'a> {
    pub settings: heapless::Vec<ParsedSetting<'a>, MAX_SCHEMA_ENTRIES>,
    pub signals: heapless::Vec<ParsedSignal<'a>, MAX_SCHEMA_ENTRIES>,
    pub commands: heapless::Vec<ParsedCommand<'a>, MAX_SCHEMA_ENTRIES>,
}

/// Rendered ranges carry two decimals
const RANGE_TOLERANCE: f32 = 0.005;

impl ParsedSchema<'_> {
    /// Whether this holds exactly the active entries of `schema`, in order
    pub fn describes(&self, schema: &CapabilitySchema) -> bool {
        let settings_match = self
            .settings
            .iter()
            .eq_by_key(schema.settings.iter().filter(|s| s.active), |p, s| {
                p.name == s.name
                    && p.value_type == s.value_type
                    && p.writable == s.writable
                    && p.units == s.units
                    && match p.range {
                        Some((min, max)) => {
                            s.has_range()
                                && (min - s.min).abs() <= RANGE_TOLERANCE
                                && (max - s.max).abs() <= RANGE_TOLERANCE
                        }
                        None => !s.has_range(),
                    }
            });
        let signals_match = self
            .signals
            .iter()
            .eq_by_key(schema.signals.iter().filter(|s| s.active), |p, s| {
                p.name == s.name
                    && p.value_type == s.value_type
                    && p.writable == s.writable
                    && p.units == s.units
            });
        let commands_match = self
            .commands
            .iter()
            .eq_by_key(schema.commands.iter().filter(|c| c.active), |p, c| {
                p.name == c.name && p.args == c.args
            });
        settings_match && signals_match && commands_match
    }
}

/// Pairwise comparison of two iterators of different item types
trait EqByKey: Iterator + Sized {
    fn eq_by_key<J, F>(mut self, other: J, mut eq: F) -> bool
    where
        J: IntoIterator,
        F: FnMut(Self::Item, J::Item) -> bool,
    {
        let mut other = other.into_iter();
        loop {
            match (self.next(), other.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) => {
                    if !eq(a, b) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl<I: Iterator> EqByKey for I {}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Settings,
    Signals,
    Commands,
}

/// Parse the text form
///
/// Blank lines are ignored. The returned entries borrow from `text`.
pub fn parse(text: &str) -> Result<ParsedSchema<'_>, SchemaError> {
    let mut schema = ParsedSchema::default();
    let mut section: Option<Section> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let entry = raw.trim_end_matches('\r');
        if entry.trim().is_empty() {
            continue;
        }

        if let Some(header) = entry.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            let next = match header {
                "settings" => Section::Settings,
                "signals" => Section::Signals,
                "commands" => Section::Commands,
                _ => return Err(SchemaError::UnknownSection { line }),
            };
            if section.is_some_and(|current| current >= next) {
                return Err(SchemaError::SectionOrder { line });
            }
            section = Some(next);
            continue;
        }

        match section {
            None => return Err(SchemaError::MissingSection { line }),
            Some(Section::Settings) => {
                let setting = parse_setting(entry, line)?;
                schema
                    .settings
                    .push(setting)
                    .map_err(|_| SchemaError::TooManyEntries)?;
            }
            Some(Section::Signals) => {
                let signal = parse_signal(entry, line)?;
                schema
                    .signals
                    .push(signal)
                    .map_err(|_| SchemaError::TooManyEntries)?;
            }
            Some(Section::Commands) => {
                let (name, args) = entry.split_once(' ').unwrap_or((entry, ""));
                if name.is_empty() {
                    return Err(SchemaError::Malformed { line });
                }
                schema
                    .commands
                    .push(ParsedCommand { name, args })
                    .map_err(|_| SchemaError::TooManyEntries)?;
            }
        }
    }
    Ok(schema)
}

fn parse_kind(
    fields: &mut core::str::Split<'_, char>,
    line: usize,
) -> Result<(ValueType, bool), SchemaError> {
    let value_type = fields
        .next()
        .ok_or(SchemaError::Malformed { line })
        .and_then(|t| ValueType::from_name(t).ok_or(SchemaError::UnknownType { line }))?;
    let writable = match fields.next() {
        Some("rw") => true,
        Some("ro") => false,
        _ => return Err(SchemaError::Malformed { line }),
    };
    Ok((value_type, writable))
}

fn parse_setting(entry: &str, line: usize) -> Result<ParsedSetting<'_>, SchemaError> {
    let mut fields = entry.split(':');
    let name = fields.next().filter(|n| !n.is_empty()).ok_or(SchemaError::Malformed { line })?;
    let (value_type, writable) = parse_kind(&mut fields, line)?;

    let mut range = None;
    let mut units = "";
    if let Some(field) = fields.next() {
        match parse_range(field) {
            Some(r) => {
                range = Some(r);
                units = fields.next().unwrap_or("");
            }
            None => units = field,
        }
    }
    if fields.next().is_some() {
        return Err(SchemaError::Malformed { line });
    }
    Ok(ParsedSetting {
        name,
        value_type,
        writable,
        range,
        units,
    })
}

fn parse_signal(entry: &str, line: usize) -> Result<ParsedSignal<'_>, SchemaError> {
    let mut fields = entry.split(':');
    let name = fields.next().filter(|n| !n.is_empty()).ok_or(SchemaError::Malformed { line })?;
    let (value_type, writable) = parse_kind(&mut fields, line)?;
    let units = fields.next().unwrap_or("");
    if fields.next().is_some() {
        return Err(SchemaError::Malformed { line });
    }
    Ok(ParsedSignal {
        name,
        value_type,
        writable,
        units,
    })
}

/// `<min>-<max>`, where `min` may itself be negative
fn parse_range(field: &str) -> Option<(f32, f32)> {
    let split = field.get(1..)?.find('-')? + 1;
    let min = field[..split].parse::<f32>().ok()?;
    let max = field[split + 1..].parse::<f32>().ok()?;
    Some((min, max))
}

/// Typed parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue<'a> {
    Bool(bool),
    Int(i32),
    Float(f32),
    /// Enum or string value
    Text(&'a str),
}

impl<'a> ParamValue<'a> {
    /// Interpret `text` as a value of `value_type`
    ///
    /// Booleans accept `true/false`, `1/0` and `on/off`. Counters parse as
    /// integers; enums and strings are kept as text.
    ///
    /// # Errors
    ///
    /// `InvalidValue` if the text does not parse, or for event, blob and
    /// unknown types which carry no settable value.
    pub fn parse_as(value_type: ValueType, text: &'a str) -> Result<Self, SchemaError> {
        let text = text.trim();
        match value_type {
            ValueType::Bool => match text {
                "true" | "1" | "on" => Ok(ParamValue::Bool(true)),
                "false" | "0" | "off" => Ok(ParamValue::Bool(false)),
                _ => Err(SchemaError::InvalidValue),
            },
            ValueType::Int | ValueType::Counter => text
                .parse()
                .map(ParamValue::Int)
                .map_err(|_| SchemaError::InvalidValue),
            ValueType::Float => text
                .parse()
                .map(ParamValue::Float)
                .map_err(|_| SchemaError::InvalidValue),
            ValueType::Enum | ValueType::String => Ok(ParamValue::Text(text)),
            ValueType::Event | ValueType::Blob | ValueType::Unknown => {
                Err(SchemaError::InvalidValue)
            }
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParamValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            ParamValue::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Floats, or integers widened to float
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            ParamValue::Float(v) => Some(v),
            ParamValue::Int(v) => Some(v as f32),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            ParamValue::Text(t) => Some(t),
            _ => None,
        }
    }

    fn fits(&self, value_type: ValueType) -> bool {
        matches!(
            (value_type, self),
            (ValueType::Bool, ParamValue::Bool(_))
                | (ValueType::Int | ValueType::Counter, ParamValue::Int(_))
                | (ValueType::Float, ParamValue::Float(_) | ParamValue::Int(_))
                | (ValueType::Enum | ValueType::String, ParamValue::Text(_))
        )
    }
}

impl fmt::Display for ParamValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(t) => f.write_str(t),
        }
    }
}

/// Guard shared by every `set_parameter`
///
/// # Errors
///
/// - `InvalidArgument` for an unknown name, a value of the wrong type or a
///   numeric value outside the declared range
/// - `AccessViolation` for a read-only setting
pub fn check_settable(
    schema: &CapabilitySchema,
    name: &str,
    value: &ParamValue<'_>,
) -> Result<&'static Setting, DriverError> {
    let setting = schema.find_setting(name).ok_or(DriverError::InvalidArgument)?;
    if !setting.writable {
        return Err(DriverError::AccessViolation);
    }
    if !value.fits(setting.value_type) {
        return Err(DriverError::InvalidArgument);
    }
    if setting.has_range() {
        if let Some(v) = value.as_f32() {
            if v < setting.min || v > setting.max {
                return Err(DriverError::InvalidArgument);
            }
        }
    }
    Ok(setting)
}
