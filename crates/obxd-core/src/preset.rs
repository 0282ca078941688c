//! Factory preset banks.
//!
//! OB-Xd banks are FXB containers whose chunk data holds an XML document of
//! the form:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Datsounds currentProgram="0">
//!   <programs>
//!     <program programName="Lead" Val_0="0" Val_1="0.5" ... Val_79="1"/>
//!     ...
//! ```
//!
//! The container header is never trusted. The loader scans for the XML
//! prologue, then walks `<program ` elements and probes their attributes by
//! name, so attribute order and unknown attributes do not matter.
//!
//! # Partial presets
//!
//! Banks written by older releases carry fewer `Val_<i>` attributes. A
//! record's [`populated_count`](PresetRecord::populated_count) is one past the
//! highest index it carries, and applying it leaves every slot at or beyond
//! that count untouched.

use std::path::Path;

use crate::engine::EngineParam;
use crate::error::{BridgeError, Result};

/// Highest number of `Val_<i>` attributes probed per program.
pub const MAX_PRESET_VALUES: usize = 100;

/// Byte capacity of a preset name.
pub const PRESET_NAME_CAPACITY: usize = 31;

const XML_PROLOGUE: &[u8] = b"<?xml";
const PROGRAM_TAG: &str = "<program ";

/// Slots a preset pushes into the engine, in application order.
///
/// Ascending by historical index so that interdependent engine setters always
/// see their inputs in the same relative order. Slots with a preset value but
/// no entry here are stored into the parameter vector only.
pub static PRESET_SLOTS: [EngineParam; 64] = {
    use EngineParam::*;
    [
        Volume, VoiceCount, Tune, Octave, BendRange, LegatoMode, BendLfoRate,
        VelocityFilterEnv, VelocityAmpEnv, Portamento, Unison, UnisonDetune, Osc2Detune,
        LfoFrequency, LfoSine, LfoSquare, LfoSampleHold, Lfo1Amount, Lfo2Amount, LfoOsc1,
        LfoOsc2, LfoFilter, LfoPw1, LfoPw2, Osc2HardSync, CrossMod, Osc1Pitch, Osc2Pitch,
        PitchQuantize, Osc1Saw, Osc1Pulse, Osc2Saw, Osc2Pulse, PulseWidth, Brightness,
        EnvelopePitch, Osc1Mix, Osc2Mix, NoiseMix, FilterKeyFollow, Cutoff, Resonance,
        Multimode, Bandpass, FourPole, FilterEnvAmount, AmpAttack, AmpDecay, AmpSustain,
        AmpRelease, FilterAttack, FilterDecay, FilterSustain, FilterRelease, EnvelopeDetune,
        FilterDetune, PortamentoDetune, LfoSync, PwEnv, PwEnvBoth, EnvPitchBoth,
        FilterEnvInvert, PwOsc2Offset, SelfOscPush,
    ]
};

/// Whether a preset value for `slot` is pushed to the engine.
pub fn is_applied_slot(slot: EngineParam) -> bool {
    PRESET_SLOTS.binary_search_by_key(&slot.index(), |p| p.index()).is_ok()
}

/// One program read from a bank.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetRecord {
    name: String,
    values: Vec<f32>,
}

impl PresetRecord {
    /// Create a record. The name is cut to [`PRESET_NAME_CAPACITY`] bytes on
    /// a character boundary.
    pub fn new(name: &str, values: Vec<f32>) -> Self {
        Self {
            name: truncate_name(name).to_owned(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of leading slots this record defines.
    pub fn populated_count(&self) -> usize {
        self.values.len()
    }

    /// Value for `index`, or `None` past the populated range.
    #[inline]
    pub fn value(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }
}

/// An ordered, capacity-bounded list of presets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetBank {
    presets: Vec<PresetRecord>,
}

impl PresetBank {
    /// A bank with no presets.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a bank from already-parsed records, keeping at most `capacity`.
    pub fn from_records(mut presets: Vec<PresetRecord>, capacity: usize) -> Self {
        presets.truncate(capacity);
        Self { presets }
    }

    /// Read and parse a bank file.
    pub fn load(path: &Path, capacity: usize) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| BridgeError::BankUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let bank = Self::parse(&bytes, capacity)?;
        log::info!("Loaded {} presets from {}", bank.len(), path.display());
        Ok(bank)
    }

    /// Parse bank bytes.
    ///
    /// Fails only when no XML prologue exists anywhere in `bytes`. A program
    /// list without any `<program ` element yields an empty bank.
    pub fn parse(bytes: &[u8], capacity: usize) -> Result<Self> {
        let start = bytes
            .windows(XML_PROLOGUE.len())
            .position(|window| window == XML_PROLOGUE)
            .ok_or(BridgeError::MissingProgramList)?;

        let payload = &bytes[start..];
        let payload = match payload.iter().position(|&b| b == 0) {
            Some(end) => &payload[..end],
            None => payload,
        };
        let text = String::from_utf8_lossy(payload);

        let mut presets = Vec::new();
        let mut rest: &str = &text;
        while let Some(pos) = rest.find(PROGRAM_TAG) {
            if presets.len() == capacity {
                log::warn!("Preset bank exceeds {capacity} programs; ignoring the rest");
                break;
            }

            // Keep the separating space so the first attribute is found too.
            let element = &rest[pos + PROGRAM_TAG.len() - 1..];
            let end = element.find(PROGRAM_TAG).unwrap_or(element.len());
            let tag = &element[..start_tag_len(&element[..end])];
            presets.push(parse_program(tag, presets.len()));
            rest = &element[end..];
        }

        Ok(Self { presets })
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PresetRecord> {
        self.presets.get(index)
    }
}

fn parse_program(element: &str, position: usize) -> PresetRecord {
    let name = match find_attribute(element, "programName") {
        Some(raw) => decode_entities(raw),
        None => format!("Preset {position}"),
    };

    let mut values = Vec::new();
    for index in 0..MAX_PRESET_VALUES {
        if let Some(raw) = find_attribute(element, &format!("Val_{index}")) {
            values.resize(index, 0.0);
            values.push(parse_leading_float(raw));
        }
    }

    PresetRecord::new(&name, values)
}

/// Byte length of a start tag's attribute text: up to the first `>` outside
/// a quoted value, or all of `element` when the tag is never closed.
fn start_tag_len(element: &str) -> usize {
    let mut quote = None;
    for (at, c) in element.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(open), c) if c == open => quote = None,
            (None, '>') => return at,
            _ => {}
        }
    }
    element.len()
}

/// Find `name="value"` (or single-quoted) inside one element.
///
/// The name must be preceded by whitespace so that `Val_1` never matches the
/// tail of `XVal_1`.
fn find_attribute<'a>(element: &'a str, name: &str) -> Option<&'a str> {
    let mut from = 0;
    while let Some(offset) = element[from..].find(name) {
        let at = from + offset;
        from = at + name.len();

        let preceded = element[..at]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        if !preceded {
            continue;
        }

        let Some(after_eq) = element[from..].trim_start().strip_prefix('=') else {
            continue;
        };
        let after_eq = after_eq.trim_start();
        let Some(quote) = after_eq.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let value = &after_eq[1..];
        return value.find(quote).map(|end| &value[..end]);
    }
    None
}

/// Parse the longest numeric prefix, the way C's `atof` reads attribute text.
/// Text with no numeric prefix reads as zero.
fn parse_leading_float(raw: &str) -> f32 {
    let s = raw.trim_start();
    let candidate = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(s.len());
    (1..=candidate)
        .rev()
        .find_map(|len| s[..len].parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= PRESET_NAME_CAPACITY {
        return name;
    }
    let mut end = PRESET_NAME_CAPACITY;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
