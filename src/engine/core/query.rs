// Encode settings <-> encoder command-line query

use tracing::debug;

use super::error::ParseError;
use super::options::AdvancedOptionSet;
use super::settings::{
    Anamorphic, AudioEncoder, AudioTrack, ChapterRange, Container, CropBox, EncodeConfig,
    Framerate, MAX_AUDIO_TRACKS, Mixdown, RateControl, SampleRate, SubtitleSelection, VideoCodec,
};

/// Split a query into tokens.
///
/// Whitespace separates tokens except inside double quotes. Quotes are removed.
/// Inside a quoted span `""` stands for one literal quote; backslashes are
/// plain characters, so a Windows path like `"C:\Videos\a b.mkv"` comes back
/// unchanged.
pub fn tokenize(query: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;

    let mut chars = query.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quoted {
        return Err(ParseError::UnbalancedQuotes);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn quote_if_spaced(value: &str) -> String {
    if value.contains(char::is_whitespace) {
        quote(value)
    } else {
        value.to_string()
    }
}

fn join_list<T>(items: &[T], render: impl Fn(&T) -> String) -> String {
    items.iter().map(render).collect::<Vec<_>>().join(",")
}

/// Serialize settings into a query string.
///
/// Tokens are written in a fixed order so equal settings give identical
/// strings. Paths are always quoted. The advanced option segment is only
/// written for H.264 codecs with a non-empty option set.
pub fn encode(config: &EncodeConfig) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut flag = |parts: &mut Vec<String>, name: &str, value: Option<String>| {
        parts.push(name.to_string());
        if let Some(v) = value {
            parts.push(v);
        }
    };

    if !config.source.is_empty() {
        flag(&mut parts, "-i", Some(quote(&config.source)));
    }
    if !config.destination.is_empty() {
        flag(&mut parts, "-o", Some(quote(&config.destination)));
    }
    if let Some(title) = config.title {
        flag(&mut parts, "-t", Some(title.to_string()));
    }
    if let Some(range) = config.chapters {
        let text = if range.start == range.end {
            range.start.to_string()
        } else {
            format!("{}-{}", range.start, range.end)
        };
        flag(&mut parts, "-c", Some(text));
    }
    if let Some(container) = config.container {
        flag(&mut parts, "-f", Some(container.as_str().to_string()));
    }

    // Picture
    if let Some(crop) = config.crop {
        flag(
            &mut parts,
            "--crop",
            Some(format!(
                "{}:{}:{}:{}",
                crop.top, crop.bottom, crop.left, crop.right
            )),
        );
    }
    if let Some(width) = config.width {
        flag(&mut parts, "-w", Some(width.to_string()));
    }
    if let Some(height) = config.height {
        flag(&mut parts, "-l", Some(height.to_string()));
    }
    match config.anamorphic {
        Anamorphic::None => {}
        Anamorphic::Strict => flag(&mut parts, "-p", None),
        Anamorphic::Loose => flag(&mut parts, "-P", None),
    }
    if config.deinterlace {
        flag(&mut parts, "-d", None);
    }
    if config.grayscale {
        flag(&mut parts, "-g", None);
    }

    // Video
    if let Some(codec) = config.video_codec {
        flag(&mut parts, "-e", Some(codec.as_str().to_string()));
    }
    match config.rate_control {
        Some(RateControl::Bitrate(kbps)) => flag(&mut parts, "-b", Some(kbps.to_string())),
        Some(RateControl::TargetSize(mb)) => flag(&mut parts, "-S", Some(mb.to_string())),
        Some(RateControl::Quality(q)) => flag(&mut parts, "-q", Some(q.to_string())),
        None => {}
    }
    if config.two_pass {
        flag(&mut parts, "-2", None);
    }
    if config.turbo {
        flag(&mut parts, "-T", None);
    }
    if let Some(rate) = config.framerate {
        flag(&mut parts, "-r", Some(rate.as_str().to_string()));
    }
    if config.vfr {
        flag(&mut parts, "-V", None);
    }

    // Audio: positional lists over the enabled tracks only
    let tracks: Vec<&AudioTrack> = config.enabled_audio_tracks().collect();
    if !tracks.is_empty() {
        flag(
            &mut parts,
            "-E",
            Some(join_list(&tracks, |t| t.encoder.as_str().to_string())),
        );
        flag(
            &mut parts,
            "-B",
            Some(join_list(&tracks, |t| t.bitrate_kbps.to_string())),
        );
        flag(
            &mut parts,
            "-R",
            Some(join_list(&tracks, |t| t.sample_rate.as_str().to_string())),
        );
        if tracks.iter().any(|t| t.mixdown != Mixdown::Automatic) {
            flag(
                &mut parts,
                "-6",
                Some(join_list(&tracks, |t| t.mixdown.as_str().to_string())),
            );
        }
        if tracks.iter().any(|t| t.drc != 0.0) {
            flag(
                &mut parts,
                "-D",
                Some(join_list(&tracks, |t| t.drc.to_string())),
            );
        }
    }

    // Subtitles & chapters
    match config.subtitles {
        SubtitleSelection::None => {}
        SubtitleSelection::Autoselect => flag(&mut parts, "-U", None),
        SubtitleSelection::Track(n) => flag(&mut parts, "-s", Some(n.to_string())),
    }
    if config.forced_subtitles {
        flag(&mut parts, "-F", None);
    }
    if config.chapter_markers {
        flag(&mut parts, "-m", None);
    }

    // MP4 extras
    if config.large_file {
        flag(&mut parts, "-4", None);
    }
    if config.optimize_mp4 {
        flag(&mut parts, "-O", None);
    }
    if config.ipod_atom {
        flag(&mut parts, "-I", None);
    }

    if config.video_codec.is_some_and(VideoCodec::is_h264) && !config.advanced.is_empty() {
        flag(
            &mut parts,
            "-x",
            Some(quote_if_spaced(&config.advanced.encode())),
        );
    }

    parts.join(" ")
}

/// Per-track audio values collected before they are zipped into tracks
#[derive(Default)]
struct AudioLists {
    encoders: Vec<AudioEncoder>,
    bitrates: Vec<u32>,
    sample_rates: Vec<SampleRate>,
    mixdowns: Vec<Mixdown>,
    drcs: Vec<f32>,
}

impl AudioLists {
    fn track_count(&self) -> usize {
        [
            self.encoders.len(),
            self.bitrates.len(),
            self.sample_rates.len(),
            self.mixdowns.len(),
            self.drcs.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
        .min(MAX_AUDIO_TRACKS)
    }

    fn apply(self, config: &mut EncodeConfig) {
        let defaults = AudioTrack::default();
        for i in 0..self.track_count() {
            config.audio_tracks[i] = Some(AudioTrack {
                encoder: self.encoders.get(i).copied().unwrap_or(defaults.encoder),
                bitrate_kbps: self.bitrates.get(i).copied().unwrap_or(defaults.bitrate_kbps),
                sample_rate: self
                    .sample_rates
                    .get(i)
                    .copied()
                    .unwrap_or(defaults.sample_rate),
                mixdown: self.mixdowns.get(i).copied().unwrap_or(defaults.mixdown),
                drc: self.drcs.get(i).copied().unwrap_or(defaults.drc),
            });
        }
    }
}

/// Token cursor that fills an `EncodeConfig`
struct QueryParser {
    tokens: Vec<String>,
    pos: usize,
    config: EncodeConfig,
    audio: AudioLists,
}

impl QueryParser {
    fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            pos: 0,
            config: EncodeConfig::default(),
            audio: AudioLists::default(),
        }
    }

    fn parse(mut self) -> Result<EncodeConfig, ParseError> {
        while self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;

            if !token.starts_with('-') {
                debug!(token = %token, "ignoring stray query token");
                continue;
            }

            match token.as_str() {
                "-i" | "--input" => self.config.source = self.value(&token)?,
                "-o" | "--output" => self.config.destination = self.value(&token)?,
                "-t" | "--title" => self.config.title = Some(self.number(&token)?),
                "-c" | "--chapters" => {
                    let raw = self.value(&token)?;
                    self.config.chapters = Some(parse_chapters(&token, &raw)?);
                }
                "-f" | "--format" => {
                    let raw = self.value(&token)?;
                    self.config.container = Some(Container::parse(&raw).ok_or_else(|| {
                        ParseError::invalid(&token, &raw, "mp4, m4v, mkv, avi or ogm")
                    })?);
                }
                "--crop" => {
                    let raw = self.value(&token)?;
                    self.config.crop = Some(parse_crop(&token, &raw)?);
                }
                "-w" | "--width" => self.config.width = Some(self.number(&token)?),
                "-l" | "--height" => self.config.height = Some(self.number(&token)?),
                "-p" | "--pixelratio" => self.config.anamorphic = Anamorphic::Strict,
                "-P" | "--loosePixelratio" => self.config.anamorphic = Anamorphic::Loose,
                "-d" | "--deinterlace" => self.config.deinterlace = true,
                "-g" | "--grayscale" => self.config.grayscale = true,
                "-e" | "--encoder" => {
                    let raw = self.value(&token)?;
                    self.config.video_codec = Some(VideoCodec::parse(&raw).ok_or_else(|| {
                        ParseError::invalid(&token, &raw, "ffmpeg, xvid, x264, x264b30 or theora")
                    })?);
                }
                "-b" | "--vb" => {
                    let kbps = self.number(&token)?;
                    self.config.set_bitrate(kbps);
                }
                "-S" | "--size" => {
                    let mb = self.number(&token)?;
                    self.config.set_target_size(mb);
                }
                "-q" | "--quality" => {
                    let raw = self.value(&token)?;
                    let q = parse_quality(&token, &raw)?;
                    self.config.rate_control = Some(RateControl::Quality(q));
                }
                "-2" | "--two-pass" => self.config.two_pass = true,
                "-T" | "--turbo" => self.config.turbo = true,
                "-r" | "--rate" => {
                    let raw = self.value(&token)?;
                    self.config.framerate = Some(Framerate::parse(&raw).ok_or_else(|| {
                        ParseError::invalid(&token, &raw, "a supported frame rate")
                    })?);
                }
                "-V" | "--vfr" => self.config.vfr = true,
                "-E" | "--aencoder" => {
                    let raw = self.value(&token)?;
                    self.audio.encoders = parse_list(&token, &raw, |s| {
                        AudioEncoder::parse(s).ok_or("aac, lame, vorbis or ac3")
                    })?;
                }
                "-B" | "--ab" => {
                    let raw = self.value(&token)?;
                    self.audio.bitrates = parse_list(&token, &raw, |s| {
                        s.parse::<u32>().map_err(|_| "a bitrate in kbps")
                    })?;
                }
                "-R" | "--arate" => {
                    let raw = self.value(&token)?;
                    self.audio.sample_rates = parse_list(&token, &raw, |s| {
                        SampleRate::parse(s).ok_or("22.05, 24, 32, 44.1 or 48")
                    })?;
                }
                "-6" | "--mixdown" => {
                    let raw = self.value(&token)?;
                    self.audio.mixdowns = parse_list(&token, &raw, |s| {
                        Mixdown::parse(s).ok_or("auto, mono, stereo, dpl1, dpl2 or 6ch")
                    })?;
                }
                "-D" | "--drc" => {
                    let raw = self.value(&token)?;
                    self.audio.drcs = parse_list(&token, &raw, |s| {
                        s.parse::<f32>()
                            .ok()
                            .filter(|d| d.is_finite() && *d >= 0.0)
                            .ok_or("a non-negative number")
                    })?;
                }
                "-U" | "--subtitle-scan" => self.config.subtitles = SubtitleSelection::Autoselect,
                "-s" | "--subtitle" => {
                    self.config.subtitles = SubtitleSelection::Track(self.number(&token)?)
                }
                "-F" | "--subtitle-forced" => self.config.forced_subtitles = true,
                "-m" | "--markers" => self.config.chapter_markers = true,
                "-4" | "--large-file" => self.config.large_file = true,
                "-O" | "--optimize" => self.config.optimize_mp4 = true,
                "-I" | "--ipod-atom" => self.config.ipod_atom = true,
                "-x" | "--x264opts" => {
                    let raw = self.value(&token)?;
                    self.config.advanced = AdvancedOptionSet::decode(&raw)?;
                }
                other => debug!(flag = other, "ignoring unsupported query flag"),
            }
        }

        let mut config = self.config;
        self.audio.apply(&mut config);
        Ok(config)
    }

    fn value(&mut self, flag: &str) -> Result<String, ParseError> {
        let value = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::MissingValue {
                flag: flag.to_string(),
            })?;
        self.pos += 1;
        Ok(value)
    }

    fn number(&mut self, flag: &str) -> Result<u32, ParseError> {
        let raw = self.value(flag)?;
        raw.parse::<u32>()
            .map_err(|_| ParseError::invalid(flag, &raw, "a non-negative integer"))
    }
}

fn parse_list<T>(
    flag: &str,
    raw: &str,
    item: impl Fn(&str) -> Result<T, &'static str>,
) -> Result<Vec<T>, ParseError> {
    raw.split(',')
        .map(|s| item(s.trim()).map_err(|expected| ParseError::invalid(flag, s.trim(), expected)))
        .collect()
}

fn parse_chapters(flag: &str, raw: &str) -> Result<ChapterRange, ParseError> {
    let number = |s: &str| s.trim().parse::<u32>().ok();
    let range = match raw.split_once('-') {
        Some((start, end)) => number(start).zip(number(end)),
        None => number(raw).map(|n| (n, n)),
    };
    range
        .map(|(start, end)| ChapterRange { start, end })
        .ok_or_else(|| ParseError::invalid(flag, raw, "a chapter or chapter range like 1-5"))
}

fn parse_crop(flag: &str, raw: &str) -> Result<CropBox, ParseError> {
    let values: Vec<u32> = raw
        .split(':')
        .map(|s| s.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|_| ParseError::invalid(flag, raw, "top:bottom:left:right"))?;
    match values.as_slice() {
        [top, bottom, left, right] => Ok(CropBox {
            top: *top,
            bottom: *bottom,
            left: *left,
            right: *right,
        }),
        _ => Err(ParseError::invalid(flag, raw, "top:bottom:left:right")),
    }
}

/// Quality is a 0..=1 fraction; hand-written queries sometimes use a percentage
fn parse_quality(flag: &str, raw: &str) -> Result<f32, ParseError> {
    match raw.parse::<f32>() {
        Ok(q) if (0.0..=1.0).contains(&q) => Ok(q),
        Ok(q) if q > 1.0 && q <= 100.0 => Ok(q / 100.0),
        _ => Err(ParseError::invalid(flag, raw, "a quality between 0.0 and 1.0")),
    }
}

/// Parse a query back into settings.
///
/// Flags missing from the query leave their field at its default, and flags
/// this parser does not know are skipped. Only a malformed value is an error.
pub fn decode(query: &str) -> Result<EncodeConfig, ParseError> {
    QueryParser::new(tokenize(query)?).parse()
}
