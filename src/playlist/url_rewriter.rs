use crate::signing::UrlSigner;


pub trait PlaylistRewriter: Send + Sync {
    fn rewrite_playlist(&self, playlist: &str) -> String;
}

/// Replaces every URI line of a playlist with its signed form. Tags and blank
/// lines pass through untouched.
pub struct UrlSigningRewriter<T>
where
    T: UrlSigner,
{
    signer: T,
}

impl<T> UrlSigningRewriter<T>
where
    T: UrlSigner,
{
    pub fn new(signer: T) -> UrlSigningRewriter<T> {
        UrlSigningRewriter { signer }
    }
}

impl<T> PlaylistRewriter for UrlSigningRewriter<T>
where
    T: UrlSigner,
{
    fn rewrite_playlist(&self, playlist: &str) -> String {
        let mut rewritten = String::with_capacity(playlist.len() * 2);

        for (i, line) in playlist.split('\n').enumerate() {
            if i > 0 {
                rewritten.push('\n');
            }

            let uri = line.trim_end_matches('\r');
            if uri.is_empty() || uri.starts_with('#') {
                rewritten.push_str(line);
            } else {
                rewritten.push_str(&self.signer.sign_url(uri));
            }
        }

        rewritten
    }
}
