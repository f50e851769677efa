// Typed H.264 advanced settings and the live option-string editor

use serde::{Deserialize, Serialize};

use super::error::ParseError;
use super::options::{AdvancedOptionSet, OptionKey};

/// Direct B-frame prediction mode (`direct=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectMode {
    None,
    Spatial,
    Temporal,
    Auto,
}

impl DirectMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DirectMode::None => "none",
            DirectMode::Spatial => "spatial",
            DirectMode::Temporal => "temporal",
            DirectMode::Auto => "auto",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(DirectMode::None),
            "spatial" => Some(DirectMode::Spatial),
            "temporal" => Some(DirectMode::Temporal),
            "auto" => Some(DirectMode::Auto),
            _ => None,
        }
    }
}

/// Motion estimation method (`me=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionEstimation {
    Dia,
    Hex,
    Umh,
    Esa,
}

impl MotionEstimation {
    pub fn as_str(self) -> &'static str {
        match self {
            MotionEstimation::Dia => "dia",
            MotionEstimation::Hex => "hex",
            MotionEstimation::Umh => "umh",
            MotionEstimation::Esa => "esa",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "dia" => Some(MotionEstimation::Dia),
            "hex" => Some(MotionEstimation::Hex),
            "umh" => Some(MotionEstimation::Umh),
            "esa" => Some(MotionEstimation::Esa),
            _ => None,
        }
    }
}

/// Macroblock partition analysis (`analyse=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Analyse {
    None,
    All,
}

impl Analyse {
    pub fn as_str(self) -> &'static str {
        match self {
            Analyse::None => "none",
            Analyse::All => "all",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Analyse::None),
            "all" => Some(Analyse::All),
            _ => None,
        }
    }
}

/// Loop filter strengths (`deblock=alpha:beta`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deblock {
    pub alpha: i8,
    pub beta: i8,
}

/// One field per advanced-options widget.
///
/// `None` / `false` means the widget shows its "Default" entry and the key is
/// left out of the option string. CABAC is the exception: it is on unless the
/// string says `cabac=0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct X264Settings {
    pub ref_frames: Option<u8>,
    pub mixed_refs: bool,
    pub bframes: Option<u8>,
    pub direct: Option<DirectMode>,
    pub weighted_b: bool,
    pub b_rdo: bool,
    pub bidirectional_me: bool,
    pub b_pyramid: bool,
    pub motion_estimation: Option<MotionEstimation>,
    pub me_range: Option<u8>,
    pub subpel_me: Option<u8>,
    pub analyse: Option<Analyse>,
    pub dct8x8: bool,
    pub deblock: Option<Deblock>,
    pub trellis: Option<u8>,
    pub no_fast_pskip: bool,
    pub no_dct_decimate: bool,
    pub cabac: bool,
    /// Options with no widget, carried through untouched
    #[serde(default)]
    pub extra: AdvancedOptionSet,
}

impl Default for X264Settings {
    fn default() -> Self {
        Self {
            ref_frames: None,
            mixed_refs: false,
            bframes: None,
            direct: None,
            weighted_b: false,
            b_rdo: false,
            bidirectional_me: false,
            b_pyramid: false,
            motion_estimation: None,
            me_range: None,
            subpel_me: None,
            analyse: None,
            dct8x8: false,
            deblock: None,
            trellis: None,
            no_fast_pskip: false,
            no_dct_decimate: false,
            cabac: true,
            extra: AdvancedOptionSet::default(),
        }
    }
}

fn parse_ranged(key: OptionKey, value: Option<&str>, min: u8, max: u8) -> Result<u8, ParseError> {
    let raw = value.unwrap_or("");
    match raw.parse::<u8>() {
        Ok(n) if (min..=max).contains(&n) => Ok(n),
        _ => Err(ParseError::invalid_option(
            key.as_str(),
            raw,
            "an integer within the widget range",
        )),
    }
}

fn parse_switch(key: OptionKey, value: Option<&str>) -> Result<bool, ParseError> {
    match value {
        None | Some("1") | Some("true") => Ok(true),
        Some("0") | Some("false") => Ok(false),
        Some(other) => Err(ParseError::invalid_option(
            key.as_str(),
            other,
            "no value, 0 or 1",
        )),
    }
}

fn parse_deblock(value: Option<&str>) -> Result<Deblock, ParseError> {
    let raw = value.unwrap_or("");
    let strength = |s: &str| -> Option<i8> {
        s.trim().parse::<i8>().ok().filter(|n| (-6..=6).contains(n))
    };
    let parsed = match raw.split_once(':') {
        Some((a, b)) => strength(a).zip(strength(b)),
        None => strength(raw).map(|n| (n, n)),
    };
    parsed
        .map(|(alpha, beta)| Deblock { alpha, beta })
        .ok_or_else(|| {
            ParseError::invalid_option("deblock", raw, "alpha:beta with each in -6..=6")
        })
}

fn parse_named<T>(
    key: OptionKey,
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
    expected: &'static str,
) -> Result<T, ParseError> {
    let raw = value.unwrap_or("");
    parse(raw).ok_or_else(|| ParseError::invalid_option(key.as_str(), raw, expected))
}

impl X264Settings {
    /// Interpret an option set as widget values.
    ///
    /// Unlike [`AdvancedOptionSet::decode`], this checks each value against the
    /// range its widget can show. A valued key written bare (`bframes`) leaves
    /// its widget on "Default".
    pub fn from_options(set: &AdvancedOptionSet) -> Result<Self, ParseError> {
        let mut s = Self::default();

        for key in OptionKey::ALL {
            let Some(value) = set.get_known(key) else {
                continue;
            };
            if value.is_none() && !key.is_flag() && key != OptionKey::Cabac {
                continue;
            }
            match key {
                OptionKey::Ref => s.ref_frames = Some(parse_ranged(key, value, 0, 16)?),
                OptionKey::Bframes => s.bframes = Some(parse_ranged(key, value, 0, 16)?),
                OptionKey::Me => {
                    s.motion_estimation = Some(parse_named(
                        key,
                        value,
                        MotionEstimation::parse,
                        "dia, hex, umh or esa",
                    )?)
                }
                OptionKey::Merange => s.me_range = Some(parse_ranged(key, value, 4, 64)?),
                OptionKey::Subq => s.subpel_me = Some(parse_ranged(key, value, 0, 7)?),
                OptionKey::Trellis => s.trellis = Some(parse_ranged(key, value, 0, 2)?),
                OptionKey::Analyse => {
                    s.analyse = Some(parse_named(key, value, Analyse::parse, "none or all")?)
                }
                OptionKey::Direct => {
                    s.direct = Some(parse_named(
                        key,
                        value,
                        DirectMode::parse,
                        "none, spatial, temporal or auto",
                    )?)
                }
                OptionKey::Deblock => s.deblock = Some(parse_deblock(value)?),
                OptionKey::BPyramid => s.b_pyramid = parse_switch(key, value)?,
                OptionKey::Weightb => s.weighted_b = parse_switch(key, value)?,
                OptionKey::Brdo => s.b_rdo = parse_switch(key, value)?,
                OptionKey::Bime => s.bidirectional_me = parse_switch(key, value)?,
                OptionKey::MixedRefs => s.mixed_refs = parse_switch(key, value)?,
                OptionKey::Dct8x8 => s.dct8x8 = parse_switch(key, value)?,
                OptionKey::Cabac => s.cabac = parse_switch(key, value)?,
                OptionKey::NoFastPskip => s.no_fast_pskip = parse_switch(key, value)?,
                OptionKey::NoDctDecimate => s.no_dct_decimate = parse_switch(key, value)?,
            }
        }

        for entry in set.unknown() {
            s.extra.set(entry.key, entry.value)?;
        }

        Ok(s)
    }

    /// Render the settings back to an option set, omitting defaults
    pub fn to_options(&self) -> AdvancedOptionSet {
        let mut set = AdvancedOptionSet::new();
        let mut put = |key: OptionKey, value: Option<String>| set.put_known(key, value);

        if let Some(n) = self.ref_frames {
            put(OptionKey::Ref, Some(n.to_string()));
        }
        if let Some(n) = self.bframes {
            put(OptionKey::Bframes, Some(n.to_string()));
        }
        if let Some(me) = self.motion_estimation {
            put(OptionKey::Me, Some(me.as_str().to_string()));
        }
        if let Some(n) = self.me_range {
            put(OptionKey::Merange, Some(n.to_string()));
        }
        if let Some(n) = self.subpel_me {
            put(OptionKey::Subq, Some(n.to_string()));
        }
        if let Some(n) = self.trellis {
            put(OptionKey::Trellis, Some(n.to_string()));
        }
        if let Some(a) = self.analyse {
            put(OptionKey::Analyse, Some(a.as_str().to_string()));
        }
        if let Some(d) = self.direct {
            put(OptionKey::Direct, Some(d.as_str().to_string()));
        }
        if let Some(d) = self.deblock {
            put(OptionKey::Deblock, Some(format!("{}:{}", d.alpha, d.beta)));
        }

        let flags = [
            (OptionKey::BPyramid, self.b_pyramid),
            (OptionKey::Weightb, self.weighted_b),
            (OptionKey::Brdo, self.b_rdo),
            (OptionKey::Bime, self.bidirectional_me),
            (OptionKey::MixedRefs, self.mixed_refs),
            (OptionKey::Dct8x8, self.dct8x8),
            (OptionKey::NoFastPskip, self.no_fast_pskip),
            (OptionKey::NoDctDecimate, self.no_dct_decimate),
        ];
        for (key, on) in flags {
            if on {
                put(key, None);
            }
        }
        if !self.cabac {
            put(OptionKey::Cabac, Some("0".to_string()));
        }

        for entry in self.extra.unknown() {
            // Entries were validated when they entered `extra`
            let _ = set.set(entry.key, entry.value);
        }
        set
    }

    /// Clear options whose prerequisite widget is off
    pub fn normalize(&mut self) {
        let bframes = self.bframes.unwrap_or(0);
        if bframes == 0 {
            self.weighted_b = false;
            self.b_rdo = false;
            self.bidirectional_me = false;
            self.direct = None;
        }
        if bframes < 2 {
            self.b_pyramid = false;
        }
        if self.ref_frames.unwrap_or(1) < 2 {
            self.mixed_refs = false;
        }
        if !self.cabac {
            self.trellis = None;
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Keys whose widget differs between `self` and its normalized form
    fn keys_cleared_by(&self, normalized: &Self) -> Vec<OptionKey> {
        [
            (OptionKey::Direct, self.direct != normalized.direct),
            (OptionKey::Trellis, self.trellis != normalized.trellis),
            (OptionKey::BPyramid, self.b_pyramid != normalized.b_pyramid),
            (OptionKey::Weightb, self.weighted_b != normalized.weighted_b),
            (OptionKey::Brdo, self.b_rdo != normalized.b_rdo),
            (OptionKey::Bime, self.bidirectional_me != normalized.bidirectional_me),
            (OptionKey::MixedRefs, self.mixed_refs != normalized.mixed_refs),
        ]
        .into_iter()
        .filter_map(|(key, changed)| changed.then_some(key))
        .collect()
    }
}

/// Keeps the free-text option string and the widget values in step.
///
/// Typing only changes the text; [`OptionEditor::commit`] is the explicit
/// point where the text is parsed, standardized and pushed to the widgets.
/// A widget change goes the other way through [`OptionEditor::set_widget`].
/// The committed option set is the source of truth, so a key written out at
/// its default value stays in the text across widget changes.
#[derive(Debug, Clone, Default)]
pub struct OptionEditor {
    text: String,
    options: AdvancedOptionSet,
    settings: X264Settings,
}

impl OptionEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn settings(&self) -> &X264Settings {
        &self.settings
    }

    pub fn options(&self) -> &AdvancedOptionSet {
        &self.options
    }

    /// Replace the draft text without parsing it
    pub fn edit(&mut self, text: &str) {
        self.text = text.to_string();
    }

    /// Parse the draft text.
    ///
    /// Newlines are stripped first; an empty result resets every widget to its
    /// default. On error the widgets keep their previous values.
    pub fn commit(&mut self) -> Result<&X264Settings, ParseError> {
        let cleaned: String = self.text.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        let set = AdvancedOptionSet::decode(&cleaned)?;
        self.settings = X264Settings::from_options(&set)?;
        self.text = set.encode();
        self.options = set;
        Ok(&self.settings)
    }

    /// Update one key from its widget and re-render the text.
    ///
    /// For flag keys any `Some` switches the option on; `None` always returns
    /// the key to its default. Options switched off by the dependency rules
    /// are dropped; every other committed key is kept as written.
    pub fn set_widget(&mut self, key: OptionKey, value: Option<&str>) -> Result<(), ParseError> {
        let mut set = self.options.clone();
        match value {
            None => set.remove_known(key),
            Some(_) if key.is_flag() => set.set_flag(key),
            Some(v) => set.set_known(key, Some(v))?,
        }
        let settings = X264Settings::from_options(&set)?;
        let normalized = settings.clone().normalized();
        for cleared in settings.keys_cleared_by(&normalized) {
            set.remove_known(cleared);
        }
        self.settings = normalized;
        self.text = set.encode();
        self.options = set;
        Ok(())
    }

    /// Load widget values directly (e.g. from a preset)
    pub fn load(&mut self, settings: X264Settings) {
        self.settings = settings.normalized();
        self.options = self.settings.to_options();
        self.text = self.options.encode();
    }

    /// Back to all-defaults, empty text
    pub fn reset(&mut self) {
        self.settings = X264Settings::default();
        self.options = AdvancedOptionSet::new();
        self.text.clear();
    }
}
