use serde::{Deserialize, Serialize};
use std::path::Path;

use super::options::AdvancedOptionSet;

/// Number of audio track slots the front end offers
pub const MAX_AUDIO_TRACKS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    M4v,
    Mkv,
    Avi,
    Ogm,
}

impl Container {
    pub const ALL: [Container; 5] = [
        Container::Mp4,
        Container::M4v,
        Container::Mkv,
        Container::Avi,
        Container::Ogm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::M4v => "m4v",
            Container::Mkv => "mkv",
            Container::Avi => "avi",
            Container::Ogm => "ogm",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    /// Container named by a destination file extension
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        Self::parse(&ext)
    }

    pub fn is_mp4_family(self) -> bool {
        matches!(self, Container::Mp4 | Container::M4v)
    }

    /// Audio encoders the container can carry, preferred first
    pub fn audio_encoders(self) -> &'static [AudioEncoder] {
        match self {
            Container::Mp4 | Container::M4v => &[AudioEncoder::Aac, AudioEncoder::Ac3],
            Container::Avi => &[AudioEncoder::Mp3, AudioEncoder::Ac3],
            Container::Ogm => &[AudioEncoder::Vorbis],
            Container::Mkv => &AudioEncoder::ALL,
        }
    }

    /// The codec to use in this container in place of `codec`
    pub fn fit_video_codec(self, codec: VideoCodec) -> VideoCodec {
        match self {
            Container::Ogm if codec.is_h264() => VideoCodec::Theora,
            Container::Mp4 | Container::M4v | Container::Avi if codec == VideoCodec::Theora => {
                VideoCodec::H264
            }
            _ => codec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// MPEG-4 (FFmpeg)
    Mpeg4,
    Xvid,
    H264,
    /// H.264 baseline profile for iPod playback
    H264Ipod,
    /// VP3 (Theora), the OGM counterpart of H.264
    Theora,
}

impl VideoCodec {
    pub const ALL: [VideoCodec; 5] = [
        VideoCodec::Mpeg4,
        VideoCodec::Xvid,
        VideoCodec::H264,
        VideoCodec::H264Ipod,
        VideoCodec::Theora,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VideoCodec::Mpeg4 => "ffmpeg",
            VideoCodec::Xvid => "xvid",
            VideoCodec::H264 => "x264",
            VideoCodec::H264Ipod => "x264b30",
            VideoCodec::Theora => "theora",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    /// Whether the codec takes an advanced option string (`-x`)
    pub fn is_h264(self) -> bool {
        matches!(self, VideoCodec::H264 | VideoCodec::H264Ipod)
    }
}

/// Video rate control; only one mode can be active
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateControl {
    /// Average bitrate in kbps (`-b`)
    Bitrate(u32),
    /// Target file size in MB (`-S`)
    TargetSize(u32),
    /// Constant quality, 0.0..=1.0 (`-q`)
    Quality(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framerate {
    #[serde(rename = "5")]
    Fps5,
    #[serde(rename = "10")]
    Fps10,
    #[serde(rename = "12")]
    Fps12,
    #[serde(rename = "15")]
    Fps15,
    #[serde(rename = "23.976")]
    Fps23_976,
    #[serde(rename = "24")]
    Fps24,
    #[serde(rename = "25")]
    Fps25,
    #[serde(rename = "29.97")]
    Fps29_97,
}

impl Framerate {
    pub const ALL: [Framerate; 8] = [
        Framerate::Fps5,
        Framerate::Fps10,
        Framerate::Fps12,
        Framerate::Fps15,
        Framerate::Fps23_976,
        Framerate::Fps24,
        Framerate::Fps25,
        Framerate::Fps29_97,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Framerate::Fps5 => "5",
            Framerate::Fps10 => "10",
            Framerate::Fps12 => "12",
            Framerate::Fps15 => "15",
            Framerate::Fps23_976 => "23.976",
            Framerate::Fps24 => "24",
            Framerate::Fps25 => "25",
            Framerate::Fps29_97 => "29.97",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anamorphic {
    #[default]
    None,
    Strict,
    Loose,
}

/// Crop in pixels, in the encoder's `top:bottom:left:right` order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CropBox {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoder {
    #[default]
    Aac,
    Mp3,
    Vorbis,
    Ac3,
}

impl AudioEncoder {
    pub const ALL: [AudioEncoder; 4] = [
        AudioEncoder::Aac,
        AudioEncoder::Mp3,
        AudioEncoder::Vorbis,
        AudioEncoder::Ac3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AudioEncoder::Aac => "aac",
            AudioEncoder::Mp3 => "lame",
            AudioEncoder::Vorbis => "vorbis",
            AudioEncoder::Ac3 => "ac3",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            // Older queries name the AAC encoder after its library
            "faac" => Some(AudioEncoder::Aac),
            _ => Self::ALL.into_iter().find(|e| e.as_str() == value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleRate {
    #[serde(rename = "22.05")]
    Khz22_05,
    #[serde(rename = "24")]
    Khz24,
    #[serde(rename = "32")]
    Khz32,
    #[serde(rename = "44.1")]
    Khz44_1,
    #[default]
    #[serde(rename = "48")]
    Khz48,
}

impl SampleRate {
    pub const ALL: [SampleRate; 5] = [
        SampleRate::Khz22_05,
        SampleRate::Khz24,
        SampleRate::Khz32,
        SampleRate::Khz44_1,
        SampleRate::Khz48,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SampleRate::Khz22_05 => "22.05",
            SampleRate::Khz24 => "24",
            SampleRate::Khz32 => "32",
            SampleRate::Khz44_1 => "44.1",
            SampleRate::Khz48 => "48",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mixdown {
    #[default]
    #[serde(rename = "auto")]
    Automatic,
    #[serde(rename = "mono")]
    Mono,
    #[serde(rename = "stereo")]
    Stereo,
    #[serde(rename = "dpl1")]
    DolbySurround,
    #[serde(rename = "dpl2")]
    DolbyProLogicII,
    #[serde(rename = "6ch")]
    SixChannel,
}

impl Mixdown {
    pub const ALL: [Mixdown; 6] = [
        Mixdown::Automatic,
        Mixdown::Mono,
        Mixdown::Stereo,
        Mixdown::DolbySurround,
        Mixdown::DolbyProLogicII,
        Mixdown::SixChannel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mixdown::Automatic => "auto",
            Mixdown::Mono => "mono",
            Mixdown::Stereo => "stereo",
            Mixdown::DolbySurround => "dpl1",
            Mixdown::DolbyProLogicII => "dpl2",
            Mixdown::SixChannel => "6ch",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub encoder: AudioEncoder,
    pub bitrate_kbps: u32,
    pub sample_rate: SampleRate,
    pub mixdown: Mixdown,
    /// Dynamic range compression; 0.0 is off
    pub drc: f32,
}

impl Default for AudioTrack {
    /// What a track slot shows when it is first switched on
    fn default() -> Self {
        Self {
            encoder: AudioEncoder::Aac,
            bitrate_kbps: 160,
            sample_rate: SampleRate::Khz48,
            mixdown: Mixdown::Automatic,
            drc: 0.0,
        }
    }
}

impl AudioTrack {
    /// Highest bitrate the encoder offers for the track's mixdown
    pub fn max_bitrate_kbps(&self) -> u32 {
        match (self.encoder, self.mixdown) {
            (AudioEncoder::Aac, Mixdown::SixChannel) => 384,
            (AudioEncoder::Aac, _) => 160,
            _ => 320,
        }
    }

    /// Bring bitrate and mixdown within what the encoder supports.
    ///
    /// AC3 is passed through, so its bitrate, sample rate and mixdown go back
    /// to their defaults. MP3 and Vorbis only downmix to stereo or Dolby.
    pub fn fit_to_encoder(&mut self) {
        match self.encoder {
            AudioEncoder::Ac3 => {
                let defaults = AudioTrack::default();
                self.bitrate_kbps = defaults.bitrate_kbps;
                self.sample_rate = defaults.sample_rate;
                self.mixdown = defaults.mixdown;
            }
            AudioEncoder::Mp3 | AudioEncoder::Vorbis => {
                if matches!(self.mixdown, Mixdown::Mono | Mixdown::SixChannel) {
                    self.mixdown = Mixdown::Stereo;
                }
            }
            AudioEncoder::Aac => {}
        }
        self.bitrate_kbps = self.bitrate_kbps.min(self.max_bitrate_kbps());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleSelection {
    #[default]
    None,
    /// Let the encoder scan for a foreign-audio subtitle track
    Autoselect,
    Track(u32),
}

/// Complete encode settings snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub source: String,
    pub destination: String,
    pub title: Option<u32>,
    pub chapters: Option<ChapterRange>,
    pub container: Option<Container>,

    // Picture
    pub crop: Option<CropBox>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub anamorphic: Anamorphic,
    pub deinterlace: bool,
    pub grayscale: bool,

    // Video
    pub video_codec: Option<VideoCodec>,
    pub rate_control: Option<RateControl>,
    pub two_pass: bool,
    pub turbo: bool,
    pub framerate: Option<Framerate>,
    pub vfr: bool,

    // Audio
    pub audio_tracks: [Option<AudioTrack>; MAX_AUDIO_TRACKS],

    // Subtitles & chapters
    pub subtitles: SubtitleSelection,
    pub forced_subtitles: bool,
    pub chapter_markers: bool,

    // MP4 container extras
    pub large_file: bool,
    pub optimize_mp4: bool,
    pub ipod_atom: bool,

    pub advanced: AdvancedOptionSet,
}

impl EncodeConfig {
    pub fn set_bitrate(&mut self, kbps: u32) {
        self.rate_control = Some(RateControl::Bitrate(kbps));
    }

    pub fn set_target_size(&mut self, megabytes: u32) {
        self.rate_control = Some(RateControl::TargetSize(megabytes));
    }

    pub fn set_quality(&mut self, quality: f32) {
        self.rate_control = Some(RateControl::Quality(quality.clamp(0.0, 1.0)));
    }

    pub fn bitrate(&self) -> Option<u32> {
        match self.rate_control {
            Some(RateControl::Bitrate(kbps)) => Some(kbps),
            _ => None,
        }
    }

    pub fn target_size(&self) -> Option<u32> {
        match self.rate_control {
            Some(RateControl::TargetSize(mb)) => Some(mb),
            _ => None,
        }
    }

    pub fn quality(&self) -> Option<f32> {
        match self.rate_control {
            Some(RateControl::Quality(q)) => Some(q),
            _ => None,
        }
    }

    /// Switch on audio slot `index` (0-based).
    ///
    /// Any switched-off slot below it is switched on with default settings so
    /// the enabled tracks stay contiguous. Out-of-range indexes are ignored.
    pub fn enable_audio_track(&mut self, index: usize, track: AudioTrack) {
        if index >= MAX_AUDIO_TRACKS {
            return;
        }
        for slot in &mut self.audio_tracks[..index] {
            if slot.is_none() {
                *slot = Some(AudioTrack::default());
            }
        }
        self.audio_tracks[index] = Some(track);
    }

    /// Switch off audio slot `index` and every slot above it
    pub fn disable_audio_track(&mut self, index: usize) {
        for slot in self.audio_tracks.iter_mut().skip(index) {
            *slot = None;
        }
    }

    /// The contiguous run of enabled tracks starting at slot 0
    pub fn enabled_audio_tracks(&self) -> impl Iterator<Item = &AudioTrack> {
        self.audio_tracks.iter().map_while(Option::as_ref)
    }

    /// The explicit container, or the one the destination extension names
    pub fn effective_container(&self) -> Option<Container> {
        self.container.or_else(|| Container::from_path(&self.destination))
    }
}

/// A switched-off audio slot switches off every slot above it
pub fn apply_track_cascade(mut config: EncodeConfig) -> EncodeConfig {
    if let Some(gap) = config.audio_tracks.iter().position(Option::is_none) {
        config.disable_audio_track(gap);
    }
    config
}

/// Drop settings the chosen codec or container cannot use
pub fn apply_video_cascade(mut config: EncodeConfig) -> EncodeConfig {
    if let Some(container) = config.effective_container() {
        config.video_codec = config.video_codec.map(|c| container.fit_video_codec(c));
    }
    // VFR pins the frame rate
    if config.vfr {
        config.framerate = Some(Framerate::Fps29_97);
    }

    let h264 = config.video_codec.is_some_and(VideoCodec::is_h264);

    if !config.two_pass || !h264 {
        config.turbo = false;
    }
    if !h264 {
        if config.anamorphic == Anamorphic::Loose {
            config.anamorphic = Anamorphic::Strict;
        }
        config.advanced = AdvancedOptionSet::default();
        config.ipod_atom = false;
    }

    match config.anamorphic {
        Anamorphic::Strict => {
            config.width = None;
            config.height = None;
        }
        Anamorphic::Loose => config.height = None,
        Anamorphic::None => {}
    }

    if !config.effective_container().is_some_and(Container::is_mp4_family) {
        config.large_file = false;
        config.optimize_mp4 = false;
        config.ipod_atom = false;
    }
    config
}

/// Keep every audio track within what the container and its encoder accept.
///
/// A track whose encoder the container cannot carry switches to the
/// container's first choice and starts over from default settings.
pub fn apply_audio_cascade(mut config: EncodeConfig) -> EncodeConfig {
    let allowed: &[AudioEncoder] = match config.effective_container() {
        Some(container) => container.audio_encoders(),
        None => &AudioEncoder::ALL,
    };

    for track in config.audio_tracks.iter_mut().flatten() {
        if !allowed.contains(&track.encoder) {
            if let Some(&encoder) = allowed.first() {
                *track = AudioTrack {
                    encoder,
                    drc: track.drc,
                    ..AudioTrack::default()
                };
            }
        }
        track.fit_to_encoder();
    }
    config
}

/// Chapter markers need the `.m4v` extension for QuickTime; keep the
/// destination extension in line with the chapter-marker switch
pub fn apply_chapter_marker_extension(mut config: EncodeConfig) -> EncodeConfig {
    let (from, to) = if config.chapter_markers {
        (".mp4", ".m4v")
    } else {
        (".m4v", ".mp4")
    };
    if let Some(stem) = config.destination.strip_suffix(from) {
        config.destination = format!("{stem}{to}");
    }
    config
}

/// Run every invariant-enforcing pass
pub fn normalize(config: EncodeConfig) -> EncodeConfig {
    let config = apply_video_cascade(apply_track_cascade(config));
    apply_chapter_marker_extension(apply_audio_cascade(config))
}
