use crate::ports::view::{NoticeKind, PopupView};
use crate::spotify_rs::types::PlaylistPreview;

/// Prints the popup to the terminal.
#[derive(Debug, Default)]
pub struct TerminalView {
    rendered: usize,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }
}

impl PopupView for TerminalView {
    fn render_playlist(&mut self, preview: &PlaylistPreview) {
        self.rendered += 1;
        println!("{:<24} {}", preview.target.to_string(), preview.name);
        log::trace!("Cover for {}: {}", preview.name, preview.image_url);
    }

    fn render_end_of_list(&mut self) {
        println!("(no more playlists)");
    }

    fn notify(&mut self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success => println!("{}", message),
            NoticeKind::Error => eprintln!("error: {}", message),
        }
    }

    fn show_confirmation(&mut self, query: &str, embed_url: &str) {
        println!("Found a match for \"{}\"", query);
        println!("Preview: {}", embed_url);
    }

    fn reset_to_list(&mut self) {
        log::debug!("Back to the playlist list");
    }
}
