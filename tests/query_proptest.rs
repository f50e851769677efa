//! Property-based tests for query and option-string serialization
//!
//! Generates settings inside their documented domains and checks that
//! encoding then decoding gives the same settings back.
use hbctl::engine::{
    AdvancedOptionSet, Anamorphic, AudioEncoder, AudioTrack, ChapterRange, Container, CropBox,
    EncodeConfig, Framerate, MAX_AUDIO_TRACKS, Mixdown, OptionKey, RateControl, SampleRate,
    SubtitleSelection, VideoCodec, decode_query, encode_query,
};
use proptest::prelude::*;

fn pick<T: Copy + std::fmt::Debug + 'static>(all: &'static [T]) -> impl Strategy<Value = T> {
    prop::sample::select(all)
}

fn path() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 /._:\"\\\\-]{0,24}"
}

fn audio_track() -> impl Strategy<Value = AudioTrack> {
    (
        pick(&AudioEncoder::ALL),
        32u32..=640,
        pick(&SampleRate::ALL),
        pick(&Mixdown::ALL),
        0u32..=40,
    )
        .prop_map(|(encoder, bitrate_kbps, sample_rate, mixdown, drc)| AudioTrack {
            encoder,
            bitrate_kbps,
            sample_rate,
            mixdown,
            drc: drc as f32 / 10.0,
        })
}

fn rate_control() -> impl Strategy<Value = Option<RateControl>> {
    prop_oneof![
        Just(None),
        (0u32..=20_000).prop_map(|kbps| Some(RateControl::Bitrate(kbps))),
        (0u32..=8_000).prop_map(|mb| Some(RateControl::TargetSize(mb))),
        (0u32..=100).prop_map(|q| Some(RateControl::Quality(q as f32 / 100.0))),
    ]
}

fn option_value() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z0-9:.]{0,6}")
}

fn unknown_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,8}".prop_filter("must not be a modelled key", |k| {
        OptionKey::parse(k).is_none()
    })
}

fn advanced_set() -> impl Strategy<Value = AdvancedOptionSet> {
    (
        prop::collection::vec((pick(&OptionKey::ALL), option_value()), 0..6),
        prop::collection::vec((unknown_key(), option_value()), 0..3),
    )
        .prop_map(|(known, unknown)| {
            let mut set = AdvancedOptionSet::new();
            for (key, value) in known {
                set.set_known(key, value.as_deref()).unwrap();
            }
            for (key, value) in unknown {
                set.set(&key, value.as_deref()).unwrap();
            }
            set
        })
}

fn subtitles() -> impl Strategy<Value = SubtitleSelection> {
    prop_oneof![
        Just(SubtitleSelection::None),
        Just(SubtitleSelection::Autoselect),
        (1u32..=32).prop_map(SubtitleSelection::Track),
    ]
}

prop_compose! {
    fn picture()(
        crop in prop::option::of((0u32..200, 0u32..200, 0u32..200, 0u32..200)),
        width in prop::option::of(16u32..=1920),
        height in prop::option::of(16u32..=1080),
        anamorphic in pick(&[Anamorphic::None, Anamorphic::Strict, Anamorphic::Loose]),
        deinterlace in any::<bool>(),
        grayscale in any::<bool>(),
    ) -> (Option<CropBox>, Option<u32>, Option<u32>, Anamorphic, bool, bool) {
        let crop = crop.map(|(top, bottom, left, right)| CropBox { top, bottom, left, right });
        (crop, width, height, anamorphic, deinterlace, grayscale)
    }
}

prop_compose! {
    fn encode_config()(
        source in path(),
        destination in path(),
        title in prop::option::of(0u32..=99),
        chapters in prop::option::of((1u32..=40, 0u32..=20)),
        container in prop::option::of(pick(&Container::ALL)),
        picture in picture(),
        video_codec in prop::option::of(pick(&VideoCodec::ALL)),
        rate_control in rate_control(),
        video_flags in any::<(bool, bool, bool)>(),
        framerate in prop::option::of(pick(&Framerate::ALL)),
        tracks in prop::collection::vec(audio_track(), 0..=MAX_AUDIO_TRACKS),
        subtitles in subtitles(),
        extras in any::<(bool, bool, bool, bool, bool)>(),
        advanced in advanced_set(),
    ) -> EncodeConfig {
        let (crop, width, height, anamorphic, deinterlace, grayscale) = picture;
        let (two_pass, turbo, vfr) = video_flags;
        let (forced_subtitles, chapter_markers, large_file, optimize_mp4, ipod_atom) = extras;

        let mut config = EncodeConfig {
            source,
            destination,
            title,
            chapters: chapters.map(|(start, len)| ChapterRange { start, end: start + len }),
            container,
            crop,
            width,
            height,
            anamorphic,
            deinterlace,
            grayscale,
            video_codec,
            rate_control,
            two_pass,
            turbo,
            framerate,
            vfr,
            subtitles,
            forced_subtitles,
            chapter_markers,
            large_file,
            optimize_mp4,
            ipod_atom,
            ..Default::default()
        };
        for (i, track) in tracks.into_iter().enumerate() {
            config.enable_audio_track(i, track);
        }
        // Advanced options only travel with an H.264 codec
        if video_codec.is_some_and(VideoCodec::is_h264) {
            config.advanced = advanced;
        }
        config
    }
}

proptest! {
    #[test]
    fn prop_query_roundtrip(config in encode_config()) {
        let query = encode_query(&config);
        let decoded = decode_query(&query).unwrap();
        prop_assert_eq!(decoded, config, "query: {}", query);
    }

    #[test]
    fn prop_query_encoding_is_canonical(config in encode_config()) {
        let once = encode_query(&config);
        let twice = encode_query(&decode_query(&once).unwrap());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_option_set_roundtrip(set in advanced_set()) {
        let text = set.encode();
        prop_assert_eq!(AdvancedOptionSet::decode(&text).unwrap(), set);
    }

    #[test]
    fn prop_option_decode_is_idempotent(text in "[a-z0-9=,:. -]{0,40}") {
        if let Ok(set) = AdvancedOptionSet::decode(&text) {
            let canonical = set.encode();
            let again = AdvancedOptionSet::decode(&canonical).unwrap();
            prop_assert_eq!(again.encode(), canonical);
        }
    }

    #[test]
    fn prop_decode_never_panics(query in "[ -~]{0,80}") {
        let _ = decode_query(&query);
    }
}
