use log::debug;
use std::sync::Arc;
use warp::filters::path::FullPath;
use warp::{Filter, Rejection};

use super::problem::from_error;
use crate::error::Error;
use crate::http::WebResult;
use crate::signing::UrlSigner;

/// Rejects requests whose URL does not carry a valid signature.
pub fn verify_signature(
    signer: Arc<dyn UrlSigner>,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    let signer = warp::any().map(move || Arc::clone(&signer));

    signer
        .and(warp::path::full())
        .and(raw_query())
        .and_then(validate)
        .untuple_one()
}

fn raw_query() -> impl Filter<Extract = (String,), Error = std::convert::Infallible> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
}

async fn validate(signer: Arc<dyn UrlSigner>, path: FullPath, query: String) -> WebResult<()> {
    if signer.verify(path.as_str(), &query) {
        Ok(())
    } else {
        debug!("Signature verification failed for {}", path.as_str());
        Err(from_error(Error::Unauthorized))
    }
}
