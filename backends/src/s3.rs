use crate::adapter::{BackupContext, BackupDetails, BackupTarget};
use crate::local::CHECKSUM_TYPE;
use crate::retry::{RetryConfig, retry_with_backoff};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::Utc;
use hangar_core::config::MIB;
use hangar_core::{AdapterKind, BackupMetadata, BackupRequest, Error, Result, S3Defaults};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

pub const MIN_PART_SIZE: u64 = 5 * MIB;
pub const MAX_PART_SIZE: u64 = 5 * 1024 * MIB;
const DEFAULT_REGION: &str = "us-east-1";

/// Validated remote store parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub prefix: String,
    pub endpoint: Option<String>,
    pub path_style: bool,
    pub part_size: u64,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub retry_attempts: u32,
}

impl S3Config {
    /// Merges a request over the host defaults and validates the result.
    pub fn from_request(request: &BackupRequest, defaults: &S3Defaults) -> Result<Self> {
        let bucket = request
            .bucket
            .clone()
            .ok_or_else(|| Error::InvalidConfiguration("s3 adapter requires a bucket".to_string()))?;

        if let Some(requested) = request.part_size {
            if requested > defaults.max_part_size {
                return Err(Error::InvalidConfiguration(format!(
                    "s3 part size {} exceeds the host limit of {} bytes",
                    requested, defaults.max_part_size
                )));
            }
        }

        let config = Self {
            bucket,
            region: request
                .region
                .clone()
                .or_else(|| defaults.region.clone())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            prefix: request
                .prefix
                .clone()
                .unwrap_or_else(|| defaults.prefix.clone()),
            endpoint: request.endpoint.clone().or_else(|| defaults.endpoint.clone()),
            path_style: defaults.path_style,
            part_size: request.part_size.unwrap_or(defaults.part_size),
            access_key: defaults.access_key.clone(),
            secret_key: defaults.secret_key.clone(),
            retry_attempts: defaults.retry_attempts,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_bucket_name(&self.bucket)?;

        if self.region.trim().is_empty() {
            return Err(Error::InvalidConfiguration("s3 region must not be empty".to_string()));
        }
        if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&self.part_size) {
            return Err(Error::InvalidConfiguration(format!(
                "s3 part size {} is outside {}..={} bytes",
                self.part_size, MIN_PART_SIZE, MAX_PART_SIZE
            )));
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(Error::InvalidConfiguration(format!(
                    "s3 endpoint {} must be an http(s) url",
                    endpoint
                )));
            }
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(Error::InvalidConfiguration(
                "s3 access key and secret key must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_bucket_name(bucket: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(Error::InvalidConfiguration(format!(
            "invalid s3 bucket name {:?}: {}",
            bucket, reason
        )))
    };

    if bucket.is_empty() {
        return invalid("must not be empty");
    }
    if !(3..=63).contains(&bucket.len()) {
        return invalid("must be between 3 and 63 characters");
    }
    if !bucket
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return invalid("only lowercase letters, digits, '.' and '-' are allowed");
    }
    let edge_ok = |b: Option<u8>| b.is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if !edge_ok(bucket.bytes().next()) || !edge_ok(bucket.bytes().last()) {
        return invalid("must start and end with a letter or digit");
    }
    if bucket.contains("..") {
        return invalid("must not contain consecutive dots");
    }
    Ok(())
}

fn sdk_error<E>(action: &str, err: E) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let message = format!("{}: {}", action, DisplayErrorContext(&err));
    classify(err.code(), message)
}

/// Maps an S3 error code onto the error taxonomy.
fn classify(code: Option<&str>, message: String) -> Error {
    match code {
        Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken") => {
            Error::Authentication(message)
        }
        Some("QuotaExceeded" | "EntityTooLarge" | "ServiceQuotaExceeded") => {
            Error::QuotaExceeded(message)
        }
        _ => Error::Backend(message),
    }
}

/// Uploads archives to an S3 compatible object store.
pub struct S3Backup {
    details: BackupDetails,
    client: Client,
    config: S3Config,
    retry: RetryConfig,
}

impl S3Backup {
    pub async fn new(details: BackupDetails, config: S3Config) -> Result<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "hangar-config",
            ));
        }
        let sdk_config = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if config.path_style {
            builder = builder.force_path_style(true);
        }

        let retry = RetryConfig {
            max_attempts: config.retry_attempts.max(1),
            ..RetryConfig::default()
        };

        Ok(Self {
            details,
            client: Client::from_conf(builder.build()),
            config,
            retry,
        })
    }

    pub fn config(&self) -> &S3Config {
        &self.config
    }

    pub fn object_key(&self, ctx: &BackupContext) -> String {
        let name = format!("{}/{}.tar.gz", ctx.server, self.details.id);
        let prefix = self.config.prefix.trim_matches('/');
        if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    async fn upload_parts(
        &self,
        archive: &Path,
        key: &str,
        upload_id: &str,
    ) -> Result<(u64, String, Vec<CompletedPart>)> {
        let file = fs::File::open(archive).await.map_err(|e| {
            Error::Backend(format!("Failed to open archive {}: {}", archive.display(), e))
        })?;
        let mut parts = PartReader::new(file, buffer_len(self.config.part_size)?);
        let mut hasher = Sha256::new();
        let mut completed = Vec::new();
        let mut size = 0u64;
        let mut part_number = 1i32;

        while let Some(chunk) = parts.next_part().await? {
            hasher.update(&chunk);
            size += chunk.len() as u64;

            let content_md5 = BASE64.encode(md5::compute(&chunk).0);
            let bucket = self.config.bucket.as_str();

            let output = retry_with_backoff(&self.retry, "upload_part", || {
                let body = chunk.clone();
                let content_md5 = content_md5.clone();
                async move {
                    self.client
                        .upload_part()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(upload_id)
                        .part_number(part_number)
                        .content_md5(content_md5)
                        .body(ByteStream::from(body))
                        .send()
                        .await
                        .map_err(|e| sdk_error("Failed to upload part", e))
                }
            })
            .await?;

            debug!(key, part_number, bytes = chunk.len(), "Uploaded part");
            completed.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(output.e_tag().unwrap_or_default())
                    .build(),
            );
            part_number += 1;
        }

        Ok((size, hex::encode(hasher.finalize()), completed))
    }
}

fn buffer_len(part_size: u64) -> Result<usize> {
    usize::try_from(part_size).map_err(|_| {
        Error::InvalidConfiguration(format!(
            "s3 part size {} does not fit in memory on this platform",
            part_size
        ))
    })
}

/// Splits a stream into multipart upload parts of `part_size` bytes.
///
/// The last part may be short. An empty stream still yields one empty part,
/// since a multipart upload needs at least one.
struct PartReader<R> {
    reader: R,
    part_size: usize,
    parts_read: u32,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> PartReader<R> {
    fn new(reader: R, part_size: usize) -> Self {
        Self {
            reader,
            part_size,
            parts_read: 0,
            exhausted: false,
        }
    }

    async fn next_part(&mut self) -> Result<Option<Bytes>> {
        if self.exhausted {
            return Ok(None);
        }

        // grows with what is actually read instead of reserving a full part
        let mut buffer = Vec::new();
        (&mut self.reader)
            .take(self.part_size as u64)
            .read_to_end(&mut buffer)
            .await
            .map_err(Error::from_io)?;

        if buffer.len() < self.part_size {
            self.exhausted = true;
        }
        if buffer.is_empty() && self.parts_read > 0 {
            return Ok(None);
        }
        self.parts_read += 1;
        Ok(Some(Bytes::from(buffer)))
    }
}

#[async_trait]
impl BackupTarget for S3Backup {
    async fn run(&self, ctx: &BackupContext) -> Result<BackupMetadata> {
        let object_key = self.object_key(ctx);
        let key = object_key.as_str();
        let bucket = self.config.bucket.as_str();

        let created = retry_with_backoff(&self.retry, "create_multipart_upload", || async move {
            self.client
                .create_multipart_upload()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| sdk_error("Failed to start multipart upload", e))
        })
        .await?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::Backend("No upload ID returned".to_string()))?;

        let (size, checksum, parts) = match self.upload_parts(&ctx.archive, key, upload_id).await {
            Ok(uploaded) => uploaded,
            Err(err) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .send()
                    .await
                {
                    warn!(
                        key = %key,
                        error = %DisplayErrorContext(&abort),
                        "Failed to abort multipart upload"
                    );
                }
                return Err(err);
            }
        };

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();
        retry_with_backoff(&self.retry, "complete_multipart_upload", || {
            let completed = completed.clone();
            async move {
                self.client
                    .complete_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| sdk_error("Failed to complete multipart upload", e))
            }
        })
        .await?;

        Ok(BackupMetadata {
            id: self.details.id.clone(),
            server: ctx.server.clone(),
            adapter: AdapterKind::S3,
            location: format!("s3://{}/{}", self.config.bucket, key),
            size,
            checksum,
            checksum_type: CHECKSUM_TYPE.to_string(),
            created_at: Utc::now(),
        })
    }

    fn details(&self) -> &BackupDetails {
        &self.details
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::S3
    }
}
