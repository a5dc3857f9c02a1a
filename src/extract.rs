//! Request extractors that reject with [`Error`], so a bad request still gets
//! a JSON body with a `message`.

use axum::async_trait;
use axum::body::{Bytes, HttpBody};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, RequestParts};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::err::Error;

/// JSON request or response body.
///
/// Unparseable input is `InvalidPayload`; well-formed JSON of the wrong shape
/// is a `Validation` failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for Json<T>
where
    T: DeserializeOwned,
    B: HttpBody + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(JsonRejection::JsonDataError(err)) => Err(Error::Validation {
                message: err.to_string(),
            }),
            Err(rejection) => Err(Error::invalid_payload(rejection.to_string())),
        }
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct Path<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for Path<T>
where
    T: DeserializeOwned + Send,
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        axum::extract::Path::<T>::from_request(req)
            .await
            .map(|axum::extract::Path(value)| Path(value))
            .map_err(|rejection| Error::invalid_payload(rejection.to_string()))
    }
}

/// Raw request body of at most `LIMIT` bytes. A declared `Content-Length`
/// over the limit is refused before reading; otherwise reading stops at the
/// first chunk that crosses it.
#[derive(Debug, Clone)]
pub struct UploadBody<const LIMIT: usize>(pub Bytes);

#[async_trait]
impl<B, const LIMIT: usize> FromRequest<B> for UploadBody<LIMIT>
where
    B: HttpBody<Data = Bytes> + Send + Unpin,
    B::Error: Into<BoxError>,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let declared = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.map_or(false, |len| len > LIMIT) {
            return Err(too_large(LIMIT));
        }

        let mut body = req
            .take_body()
            .ok_or_else(|| Error::internal("BodyTaken", "Request body already extracted"))?;
        let mut bytes = Vec::with_capacity(declared.unwrap_or(0));
        while let Some(chunk) = body.data().await {
            let chunk = chunk.map_err(|err| {
                let err: BoxError = err.into();
                Error::invalid_payload(format!("Could not read request body: {}", err))
            })?;
            if bytes.len() + chunk.len() > LIMIT {
                return Err(too_large(LIMIT));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(UploadBody(Bytes::from(bytes)))
    }
}

fn too_large(limit: usize) -> Error {
    Error::PayloadTooLarge {
        message: format!("File exceeds the {} byte limit.", limit),
    }
}
