use log::{debug, error};
use std::convert::Infallible;
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::{Rejection, Reply};

use crate::error::Error;

#[derive(Debug)]
pub struct Problem {
    error: Error,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP StatusCode: {}", self.error.status_code())
    }
}

impl Reject for Problem {}

pub fn from_error(error: Error) -> Rejection {
    warp::reject::custom(Problem { error })
}

/// Turns every rejection into a short plain-text response. Server-side
/// failures are logged with their full diagnostics.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(problem) = err.find::<Problem>() {
        let status = problem.error.status_code();

        if status.is_server_error() {
            error!("{}", problem.error);
        } else {
            debug!("{}", problem.error);
        }

        (status, problem.error.public_message())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(message, status))
}
