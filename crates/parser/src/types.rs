//! Quality-related enums extracted from release names

use serde::{Deserialize, Serialize};

/// Video resolution detected in a release name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Resolution {
    Uhd2160p,
    Hd1080p,
    Hd720p,
    Sd480p,
    #[default]
    Unknown,
}

impl Resolution {
    /// Ordered rank used for upgrade decisions (higher is better)
    pub fn rank(&self) -> u8 {
        match self {
            Resolution::Uhd2160p => 4,
            Resolution::Hd1080p => 3,
            Resolution::Hd720p => 2,
            Resolution::Sd480p => 1,
            Resolution::Unknown => 0,
        }
    }

    /// Parse from a label such as "1080p", "4K" or "UHD"
    pub fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        match label.as_str() {
            "2160p" | "4k" | "uhd" => Resolution::Uhd2160p,
            "1080p" => Resolution::Hd1080p,
            "720p" => Resolution::Hd720p,
            "480p" => Resolution::Sd480p,
            _ => Resolution::Unknown,
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Uhd2160p => write!(f, "2160p"),
            Resolution::Hd1080p => write!(f, "1080p"),
            Resolution::Hd720p => write!(f, "720p"),
            Resolution::Sd480p => write!(f, "480p"),
            Resolution::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for Resolution {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Resolution::from_label(s))
    }
}

/// Media source a release was captured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SourceType {
    BluRay,
    WebDl,
    WebRip,
    Hdtv,
    Telesync,
    Cam,
    #[default]
    Unknown,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::BluRay => write!(f, "BluRay"),
            SourceType::WebDl => write!(f, "WEB-DL"),
            SourceType::WebRip => write!(f, "WEBRip"),
            SourceType::Hdtv => write!(f, "HDTV"),
            SourceType::Telesync => write!(f, "Telesync"),
            SourceType::Cam => write!(f, "CAM"),
            SourceType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Video codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Codec {
    X264,
    X265,
    #[default]
    Unknown,
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Codec::X264 => write!(f, "x264"),
            Codec::X265 => write!(f, "x265"),
            Codec::Unknown => write!(f, "unknown"),
        }
    }
}

/// HDR format, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HdrFormat {
    #[default]
    None,
    Hdr,
    Hdr10,
    Hdr10Plus,
    DolbyVision,
    Hlg,
}

impl std::fmt::Display for HdrFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HdrFormat::None => write!(f, "none"),
            HdrFormat::Hdr => write!(f, "HDR"),
            HdrFormat::Hdr10 => write!(f, "HDR10"),
            HdrFormat::Hdr10Plus => write!(f, "HDR10+"),
            HdrFormat::DolbyVision => write!(f, "DolbyVision"),
            HdrFormat::Hlg => write!(f, "HLG"),
        }
    }
}

/// Primary audio codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AudioCodec {
    Atmos,
    TrueHd,
    DtsHd,
    Dts,
    Eac3,
    Ac3,
    Aac,
    Flac,
    Opus,
    #[default]
    Unknown,
}

impl std::fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioCodec::Atmos => write!(f, "Atmos"),
            AudioCodec::TrueHd => write!(f, "TrueHD"),
            AudioCodec::DtsHd => write!(f, "DTS-HD"),
            AudioCodec::Dts => write!(f, "DTS"),
            AudioCodec::Eac3 => write!(f, "EAC3"),
            AudioCodec::Ac3 => write!(f, "AC3"),
            AudioCodec::Aac => write!(f, "AAC"),
            AudioCodec::Flac => write!(f, "FLAC"),
            AudioCodec::Opus => write!(f, "Opus"),
            AudioCodec::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_rank_is_total_order() {
        let all = [
            Resolution::Uhd2160p,
            Resolution::Hd1080p,
            Resolution::Hd720p,
            Resolution::Sd480p,
            Resolution::Unknown,
        ];
        for a in &all {
            for b in &all {
                let (lt, eq, gt) = (
                    a.rank() < b.rank(),
                    a.rank() == b.rank(),
                    a.rank() > b.rank(),
                );
                assert_eq!(1, [lt, eq, gt].iter().filter(|v| **v).count());
            }
        }
    }

    #[test]
    fn resolution_from_label_accepts_uhd_aliases() {
        assert_eq!(Resolution::from_label("4K"), Resolution::Uhd2160p);
        assert_eq!(Resolution::from_label("UHD"), Resolution::Uhd2160p);
        assert_eq!(Resolution::from_label("2160p"), Resolution::Uhd2160p);
        assert_eq!(Resolution::from_label("garbage"), Resolution::Unknown);
    }

    #[test]
    fn resolution_display_round_trips() {
        for res in [
            Resolution::Uhd2160p,
            Resolution::Hd1080p,
            Resolution::Hd720p,
            Resolution::Sd480p,
        ] {
            assert_eq!(Resolution::from_label(&res.to_string()), res);
        }
    }
}
