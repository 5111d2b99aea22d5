use crate::error::MediaHostError;

/// A file received from a client, on its way to the media host.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// Where the media host put the file. `file_name` may differ from the uploaded name.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct HostedMedia {
    pub url: String,
    pub file_name: String,
}

pub trait MediaHost: Send + Sync {
    fn upload(
        &self,
        upload: MediaUpload,
    ) -> impl Future<Output = Result<HostedMedia, MediaHostError>> + Send;
}
