use crate::spotify_rs::types::PlaylistPreview;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Rendering surface of the popup.
pub trait PopupView {
    /// Append one entry to the playlist list.
    fn render_playlist(&mut self, preview: &PlaylistPreview);

    /// Shown once after the last page of playlists.
    fn render_end_of_list(&mut self);

    /// Toast style notification.
    fn notify(&mut self, kind: NoticeKind, message: &str);

    /// Switch to the confirmation view: locked query field, confirm control
    /// and the embedded preview of the matched track.
    fn show_confirmation(&mut self, query: &str, embed_url: &str);

    /// Back to the playlist list, unlocking the query field and hiding the preview.
    fn reset_to_list(&mut self);
}
