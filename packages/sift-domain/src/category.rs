//! Maps source categories (MIME types or bare labels) to coarse families and the keywords a user
//! is likely to type when looking for that kind of file.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CategoryFamily {
	Folder,
	Document,
	Spreadsheet,
	Presentation,
	Pdf,
	Image,
	Video,
	Audio,
	Archive,
	Text,
	Other,
}
impl CategoryFamily {
	pub fn keywords(self) -> &'static [&'static str] {
		match self {
			Self::Folder => &["folder", "directory"],
			Self::Document => &["document", "doc", "docx", "word"],
			Self::Spreadsheet => &["spreadsheet", "sheet", "xlsx", "excel", "csv"],
			Self::Presentation => &["presentation", "slides", "pptx", "powerpoint", "deck"],
			Self::Pdf => &["pdf"],
			Self::Image => &["image", "photo", "picture"],
			Self::Video => &["video", "movie"],
			Self::Audio => &["audio", "music", "sound"],
			Self::Archive => &["archive", "zip"],
			Self::Text => &["text", "txt"],
			Self::Other => &[],
		}
	}
}

pub fn family_of(category: &str) -> CategoryFamily {
	let category = category.trim().to_ascii_lowercase();

	if category.is_empty() {
		return CategoryFamily::Other;
	}
	if category.ends_with(".folder") || matches!(category.as_str(), "folder" | "directory") {
		return CategoryFamily::Folder;
	}
	if category == "application/pdf" || category == "pdf" {
		return CategoryFamily::Pdf;
	}

	let (kind, subtype) = category.split_once('/').unwrap_or(("", category.as_str()));

	match kind {
		"image" => return CategoryFamily::Image,
		"video" => return CategoryFamily::Video,
		"audio" => return CategoryFamily::Audio,
		_ => {},
	}

	if subtype.contains("spreadsheet") || subtype.contains("excel") || subtype == "csv" {
		return CategoryFamily::Spreadsheet;
	}
	if subtype.contains("presentation") || subtype.contains("powerpoint") {
		return CategoryFamily::Presentation;
	}
	if subtype.contains("document") || subtype.contains("msword") || subtype == "rtf" {
		return CategoryFamily::Document;
	}
	if matches!(subtype, "zip" | "gzip" | "x-tar" | "x-7z-compressed" | "vnd.rar" | "archive") {
		return CategoryFamily::Archive;
	}
	if kind == "text" || subtype == "text" || subtype == "markdown" {
		return CategoryFamily::Text;
	}

	CategoryFamily::Other
}

/// Keywords indexed for a category: the family keywords plus the category's own tokens when it is
/// a bare label such as `"spreadsheet"` rather than a MIME type.
pub fn type_keywords(category: &str) -> Vec<String> {
	let mut out: Vec<String> =
		family_of(category).keywords().iter().map(|keyword| keyword.to_string()).collect();

	if !category.contains('/') {
		for token in crate::text::tokenize(category) {
			if !out.contains(&token) {
				out.push(token);
			}
		}
	}

	out
}
