//! Quality attribute extraction: resolution, source, codec, HDR, audio

use crate::patterns;
use crate::types::{AudioCodec, Codec, HdrFormat, Resolution, SourceType};

/// Quality attributes pulled from a normalized release name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityAttributes {
    pub resolution: Resolution,
    pub source: SourceType,
    pub codec: Codec,
    pub hdr: HdrFormat,
    pub audio: AudioCodec,
    pub remux: bool,
    pub proper: bool,
    pub repack: bool,
    pub edition: Option<String>,
    /// Byte offset of the resolution/UHD marker, used for title extraction
    pub resolution_start: Option<usize>,
    /// Byte offset of the source marker
    pub source_start: Option<usize>,
}

pub fn extract(normalized: &str) -> QualityAttributes {
    let (resolution, resolution_start) = match patterns::RESOLUTION.find(normalized) {
        Some(m) => (Resolution::from_label(m.as_str()), Some(m.start())),
        None => (Resolution::Unknown, None),
    };

    let (source, source_start) = extract_source(normalized);

    QualityAttributes {
        resolution,
        source,
        codec: extract_codec(normalized),
        hdr: extract_hdr(normalized),
        audio: extract_audio(normalized),
        remux: patterns::REMUX.is_match(normalized),
        proper: patterns::PROPER.is_match(normalized),
        repack: patterns::REPACK.is_match(normalized),
        edition: extract_edition(normalized),
        resolution_start,
        source_start,
    }
}

fn extract_source(normalized: &str) -> (SourceType, Option<usize>) {
    // WEB-DL before WEBRip before the catch-alls; BluRay first since BDRip
    // names sometimes also carry WEB tags from re-encodes.
    if let Some(m) = patterns::SOURCE_BLURAY.find(normalized) {
        return (SourceType::BluRay, Some(m.start()));
    }
    if let Some(m) = patterns::SOURCE_WEBDL.find(normalized) {
        return (SourceType::WebDl, Some(m.start()));
    }
    if let Some(m) = patterns::SOURCE_WEBRIP.find(normalized) {
        return (SourceType::WebRip, Some(m.start()));
    }
    if let Some(m) = patterns::SOURCE_HDTV.find(normalized) {
        return (SourceType::Hdtv, Some(m.start()));
    }
    if let Some(m) = patterns::SOURCE_TELESYNC.find(normalized) {
        return (SourceType::Telesync, Some(m.start()));
    }
    if let Some(m) = patterns::SOURCE_CAM.find(normalized) {
        return (SourceType::Cam, Some(m.start()));
    }
    (SourceType::Unknown, None)
}

fn extract_codec(normalized: &str) -> Codec {
    if patterns::CODEC_X265.is_match(normalized) {
        Codec::X265
    } else if patterns::CODEC_X264.is_match(normalized) {
        Codec::X264
    } else {
        Codec::Unknown
    }
}

fn extract_hdr(normalized: &str) -> HdrFormat {
    // Most specific first; DV releases often also tag HDR10 as a fallback
    // layer, and Dolby Vision wins in that case.
    if patterns::HDR_DV.is_match(normalized) {
        HdrFormat::DolbyVision
    } else if patterns::HDR_10_PLUS.is_match(normalized) {
        HdrFormat::Hdr10Plus
    } else if patterns::HDR_10.is_match(normalized) {
        HdrFormat::Hdr10
    } else if patterns::HDR_HLG.is_match(normalized) {
        HdrFormat::Hlg
    } else if patterns::HDR_PLAIN.is_match(normalized) {
        HdrFormat::Hdr
    } else {
        HdrFormat::None
    }
}

fn extract_audio(normalized: &str) -> AudioCodec {
    if patterns::AUDIO_ATMOS.is_match(normalized) {
        AudioCodec::Atmos
    } else if patterns::AUDIO_TRUEHD.is_match(normalized) {
        AudioCodec::TrueHd
    } else if patterns::AUDIO_DTSHD.is_match(normalized) {
        AudioCodec::DtsHd
    } else if patterns::AUDIO_DTS.is_match(normalized) {
        AudioCodec::Dts
    } else if patterns::AUDIO_EAC3.is_match(normalized) {
        AudioCodec::Eac3
    } else if patterns::AUDIO_AC3.is_match(normalized) {
        AudioCodec::Ac3
    } else if patterns::AUDIO_FLAC.is_match(normalized) {
        AudioCodec::Flac
    } else if patterns::AUDIO_OPUS.is_match(normalized) {
        AudioCodec::Opus
    } else if patterns::AUDIO_AAC.is_match(normalized) {
        AudioCodec::Aac
    } else {
        AudioCodec::Unknown
    }
}

fn extract_edition(normalized: &str) -> Option<String> {
    patterns::EDITION.find(normalized).map(|m| {
        let mut words: Vec<String> = m
            .as_str()
            .split([' ', '.', '_'])
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                    None => String::new(),
                }
            })
            .collect();
        if words.len() == 1 && words[0] != "Imax" && words[0] != "Unrated" && words[0] != "Theatrical" {
            words.push("Edition".to_string());
        }
        words.join(" ")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(name: &str) -> QualityAttributes {
        extract(&name.replace(['.', '_'], " "))
    }

    #[test]
    fn full_quality_line() {
        let q = attrs("Movie.2023.2160p.BluRay.REMUX.DV.HDR10.TrueHD.Atmos.x265-GRP");
        assert_eq!(q.resolution, Resolution::Uhd2160p);
        assert_eq!(q.source, SourceType::BluRay);
        assert_eq!(q.codec, Codec::X265);
        assert_eq!(q.hdr, HdrFormat::DolbyVision);
        assert_eq!(q.audio, AudioCodec::Atmos);
        assert!(q.remux);
    }

    #[test]
    fn webdl_vs_webrip() {
        assert_eq!(attrs("Show.S01E01.1080p.WEB-DL.H264").source, SourceType::WebDl);
        assert_eq!(attrs("Show.S01E01.1080p.WEBRip.x264").source, SourceType::WebRip);
        assert_eq!(attrs("Show.S01E01.1080p.WEB.DL.x264").source, SourceType::WebDl);
    }

    #[test]
    fn audio_precedence() {
        assert_eq!(attrs("Movie.1080p.DTS-HD.MA.5.1").audio, AudioCodec::DtsHd);
        assert_eq!(attrs("Movie.1080p.DTS.5.1").audio, AudioCodec::Dts);
        assert_eq!(attrs("Movie.1080p.DDP5.1").audio, AudioCodec::Eac3);
        assert_eq!(attrs("Movie.1080p.DD5.1").audio, AudioCodec::Ac3);
    }

    #[test]
    fn proper_and_repack_flags() {
        let q = attrs("Movie.2023.1080p.PROPER.REPACK.WEB-DL");
        assert!(q.proper);
        assert!(q.repack);
    }

    #[test]
    fn edition_normalization() {
        assert_eq!(
            attrs("Movie.2023.Extended.1080p.BluRay").edition.as_deref(),
            Some("Extended Edition")
        );
        assert_eq!(
            attrs("Movie.2023.Directors.Cut.1080p").edition.as_deref(),
            Some("Directors Cut")
        );
        assert_eq!(attrs("Movie.2023.IMAX.1080p").edition.as_deref(), Some("Imax"));
        assert_eq!(attrs("Movie.2023.1080p.BluRay").edition, None);
    }

    #[test]
    fn four_k_alias_sets_resolution() {
        assert_eq!(attrs("Movie.2023.4K.UHD.BluRay").resolution, Resolution::Uhd2160p);
    }
}
