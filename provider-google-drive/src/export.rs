//! Google Workspace export formats.
//!
//! Workspace documents have no binary content of their own; they are
//! downloaded through `files.export` in an office format.

/// MIME type of Drive folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Prefix shared by every Google Workspace type.
pub const WORKSPACE_MIME_PREFIX: &str = "application/vnd.google-apps.";

/// Workspace document kinds that can be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkspaceKind {
    Document,
    Spreadsheet,
    Presentation,
    Drawing,
}

impl WorkspaceKind {
    pub const ALL: [WorkspaceKind; 4] = [
        WorkspaceKind::Document,
        WorkspaceKind::Spreadsheet,
        WorkspaceKind::Presentation,
        WorkspaceKind::Drawing,
    ];

    pub fn from_mime(mime_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.source_mime() == mime_type)
    }

    pub fn source_mime(&self) -> &'static str {
        match self {
            Self::Document => "application/vnd.google-apps.document",
            Self::Spreadsheet => "application/vnd.google-apps.spreadsheet",
            Self::Presentation => "application/vnd.google-apps.presentation",
            Self::Drawing => "application/vnd.google-apps.drawing",
        }
    }

    pub fn export_mime(&self) -> &'static str {
        match self {
            Self::Document => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Spreadsheet => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Presentation => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Drawing => "image/png",
        }
    }

    /// File extension of the export format, including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Document => ".docx",
            Self::Spreadsheet => ".xlsx",
            Self::Presentation => ".pptx",
            Self::Drawing => ".png",
        }
    }

    /// `name` with the export extension appended unless it already ends with it.
    pub fn file_name(&self, name: &str) -> String {
        let extension = self.extension();
        if name.ends_with(extension) {
            name.to_string()
        } else {
            format!("{}{}", name, extension)
        }
    }
}

/// Whether `mime_type` is any Google Workspace type, exportable or not.
pub fn is_workspace_mime(mime_type: &str) -> bool {
    mime_type.starts_with(WORKSPACE_MIME_PREFIX)
}
