//! Extension-based file classification (spec §4.2 step 1).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Document,
    Image,
    Office,
    Audio,
    Video,
    SpecializedFormat,
    Unknown,
}

impl FileClass {
    /// Deterministic preference order per class (spec §4.2 step 3),
    /// matching the five engine classes enumerated against
    /// `/api/v1/engines` in the original system.
    pub fn preferred_backend(&self) -> &'static str {
        match self {
            Self::Document | Self::Image => "pipeline",
            Self::Office => "markitdown",
            Self::Audio => "sensevoice",
            Self::Video => "video",
            Self::SpecializedFormat => "specialized-format",
            Self::Unknown => "pipeline",
        }
    }
}

pub fn classify_file_name(file_name: &str) -> FileClass {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => FileClass::Document,
        "png" | "jpg" | "jpeg" | "bmp" | "gif" | "webp" | "tiff" => FileClass::Image,
        "doc" | "docx" | "ppt" | "pptx" | "xls" | "xlsx" | "rtf" => FileClass::Office,
        "mp3" | "wav" | "flac" | "m4a" | "ogg" => FileClass::Audio,
        "mp4" | "mov" | "avi" | "mkv" | "webm" => FileClass::Video,
        "fasta" | "fa" | "gb" | "gbk" | "genbank" => FileClass::SpecializedFormat,
        _ => FileClass::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(classify_file_name("report.PDF"), FileClass::Document);
        assert_eq!(classify_file_name("scan.png"), FileClass::Image);
        assert_eq!(classify_file_name("memo.docx"), FileClass::Office);
        assert_eq!(classify_file_name("call.wav"), FileClass::Audio);
        assert_eq!(classify_file_name("clip.mp4"), FileClass::Video);
        assert_eq!(classify_file_name("seq.fasta"), FileClass::SpecializedFormat);
        assert_eq!(classify_file_name("noext"), FileClass::Unknown);
    }

    #[test]
    fn preferred_backend_matches_engine_classes() {
        assert_eq!(FileClass::Document.preferred_backend(), "pipeline");
        assert_eq!(FileClass::Office.preferred_backend(), "markitdown");
        assert_eq!(FileClass::Audio.preferred_backend(), "sensevoice");
        assert_eq!(FileClass::Video.preferred_backend(), "video");
        assert_eq!(FileClass::SpecializedFormat.preferred_backend(), "specialized-format");
    }
}
