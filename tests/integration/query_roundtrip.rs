// Query text <-> settings conversions as the front end uses them

use hbctl::engine::{
    AdvancedOptionSet, Anamorphic, AudioEncoder, ChapterRange, Container, CropBox, EncodeConfig,
    Framerate, Mixdown, ParseError, SampleRate, SubtitleSelection, VideoCodec, decode_query,
    encode_query, normalize,
};

use crate::common::helpers::*;

#[test]
fn test_example_query_shape() {
    let mut config = sample_config();
    config.source = "/in.mkv".to_string();
    config.destination = "/out.mp4".to_string();
    config.set_bitrate(1000);

    let query = encode_query(&config);
    assert!(query.starts_with(r#"-i "/in.mkv" -o "/out.mp4" "#));
    assert!(query.contains("-b 1000"));
    assert!(query.ends_with("-E aac -B 160 -R 48"));
    assert_eq!(decode_query(&query).unwrap(), config);
}

#[test]
fn test_full_config_roundtrip() {
    let mut config = EncodeConfig {
        source: r"C:\Rips\Movie Disc\VIDEO_TS".to_string(),
        destination: "/home/me/Movies/Big Film.m4v".to_string(),
        title: Some(2),
        chapters: Some(ChapterRange { start: 3, end: 9 }),
        container: Some(Container::M4v),
        crop: Some(CropBox {
            top: 60,
            bottom: 62,
            left: 0,
            right: 4,
        }),
        width: Some(720),
        anamorphic: Anamorphic::Loose,
        deinterlace: true,
        video_codec: Some(VideoCodec::H264),
        two_pass: true,
        turbo: true,
        framerate: Some(Framerate::Fps23_976),
        subtitles: SubtitleSelection::Track(1),
        forced_subtitles: true,
        chapter_markers: true,
        large_file: true,
        optimize_mp4: true,
        ipod_atom: true,
        advanced: AdvancedOptionSet::decode("ref=3,mixed-refs,bframes=3,b-pyramid,me=umh")
            .unwrap(),
        ..Default::default()
    };
    config.set_quality(0.65);
    config.enable_audio_track(0, audio_track(AudioEncoder::Aac, 160));
    let mut surround = audio_track(AudioEncoder::Ac3, 448);
    surround.mixdown = Mixdown::SixChannel;
    surround.drc = 2.5;
    config.enable_audio_track(1, surround);

    let query = encode_query(&config);
    assert_eq!(decode_query(&query).unwrap(), config);
    assert!(query.contains("-6 auto,6ch"));
    assert!(query.contains("-D 0,2.5"));
    assert!(query.contains(r#"-i "C:\Rips\Movie Disc\VIDEO_TS""#));
}

#[test]
fn test_encoding_is_stable() {
    let config = sample_config();
    let once = encode_query(&config);
    let twice = encode_query(&decode_query(&once).unwrap());
    assert_eq!(once, twice);
}

#[test]
fn test_hand_written_query_in_any_order() {
    let config = decode_query(
        r#"-E ac3,aac -R 48,44.1 -e x264 -o "/out.mkv" -f mkv -b 2000 -i /in.vob -B 384,128 -U -F"#,
    )
    .unwrap();

    assert_eq!(config.source, "/in.vob");
    assert_eq!(config.container, Some(Container::Mkv));
    assert_eq!(config.bitrate(), Some(2000));
    assert_eq!(config.subtitles, SubtitleSelection::Autoselect);
    assert!(config.forced_subtitles);

    let tracks: Vec<_> = config.enabled_audio_tracks().collect();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].encoder, AudioEncoder::Ac3);
    assert_eq!(tracks[0].bitrate_kbps, 384);
    assert_eq!(tracks[1].sample_rate, SampleRate::Khz44_1);
}

#[test]
fn test_more_than_four_audio_entries_are_dropped() {
    let config = decode_query("-E aac,aac,aac,aac,ac3").unwrap();
    assert_eq!(config.enabled_audio_tracks().count(), 4);
}

#[test]
fn test_malformed_values_name_their_flag() {
    let cases = [
        ("-w wide", "-w"),
        ("-f mov", "-f"),
        ("--crop 1:2:3", "--crop"),
        ("-c 4-x", "-c"),
        ("-r 30", "-r"),
        ("-R 48,96", "-R"),
        ("-q 250", "-q"),
        ("-D -1", "-D"),
    ];
    for (query, expected_flag) in cases {
        match decode_query(query) {
            Err(ParseError::InvalidValue { flag, .. }) => {
                assert_eq!(flag, expected_flag, "query {:?}", query)
            }
            other => panic!("query {:?} gave {:?}", query, other),
        }
    }
}

#[test]
fn test_bad_advanced_segment_is_an_error() {
    assert!(matches!(
        decode_query("-e x264 -x ref=2,=5"),
        Err(ParseError::EmptyOptionKey { .. })
    ));
}

#[test]
fn test_normalize_then_encode() {
    let mut config = sample_config();
    config.video_codec = Some(VideoCodec::Xvid);
    config.anamorphic = Anamorphic::Loose;
    config.width = Some(640);
    config.height = Some(480);
    config.turbo = true;
    config.ipod_atom = true;
    config.container = Some(Container::Mp4);
    config.chapter_markers = true;
    config.advanced = AdvancedOptionSet::decode("ref=2").unwrap();

    let normalized = normalize(config);
    assert_eq!(normalized.anamorphic, Anamorphic::Strict);
    assert_eq!(normalized.width, None);
    assert!(!normalized.turbo);
    assert!(!normalized.ipod_atom);
    assert!(normalized.advanced.is_empty());
    assert_eq!(normalized.destination, "/media/out.m4v");

    assert_eq!(
        encode_query(&normalized),
        r#"-i "/media/in.mkv" -o "/media/out.m4v" -f mp4 -p -e xvid -b 1500 -E aac -B 160 -R 48 -m"#
    );
}
