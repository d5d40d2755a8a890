use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use anyhow::{anyhow, Context as AnyhowContext, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::future::poll_fn;
use log::{debug, warn};
use rusoto_core::ByteStream;
use rusoto_s3::{
    AbortMultipartUploadRequest, CompleteMultipartUploadRequest, CompletedMultipartUpload,
    CompletedPart, CreateMultipartUploadRequest, PutObjectRequest, S3Client, UploadPartRequest, S3,
};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::PollSender;

use crate::cloud::streaming_target::StreamingTarget;
use crate::constants::{MAX_UPLOAD_RETRIES, PART_QUEUE_DEPTH, RETRY_BASE_DELAY_MS, S3_MIN_PART_SIZE_MB};

struct PartUpload {
    data: Bytes,
    part_number: i64,
}

struct MultipartUpload {
    upload_id: String,
    parts: Vec<CompletedPart>,
}

type WorkerResult = Result<Option<MultipartUpload>>;

/// A stream that buffers data and uploads it to S3.
///
/// This implementation provides:
/// - Buffered writes that are handed to a background task as multipart parts
///   once a full part has accumulated
/// - Lazy multipart creation: an object that fits in a single buffer is sent
///   with one `PutObject` when the stream is completed
/// - Automatic retry with exponential backoff for every request
/// - Abort of the multipart upload when a part cannot be uploaded
/// - Backpressure: `poll_write` waits while the part queue is full
pub struct S3UploadStream {
    client: Arc<S3Client>,
    bucket: String,
    key: String,
    buffer: BytesMut,
    part_size: usize,
    next_part: i64,
    sender: PollSender<PartUpload>,
    /// `None` once a failed worker has been joined from `poll_write`
    worker: Option<JoinHandle<WorkerResult>>,
    /// Cause reported by a worker that stopped early
    failure: Option<String>,
    bytes_uploaded: Arc<AtomicU64>,
}

impl S3UploadStream {
    /// Create a new S3 upload stream.
    ///
    /// No request is sent yet; the part size is clamped to the S3 minimum of 5MB.
    /// Must be called from within a Tokio runtime.
    pub fn new(client: Arc<S3Client>, bucket: &str, key: &str, part_size_mb: usize) -> Self {
        let part_size = part_size_mb.max(S3_MIN_PART_SIZE_MB) * 1024 * 1024;
        let (sender, receiver) = mpsc::channel::<PartUpload>(PART_QUEUE_DEPTH);
        let bytes_uploaded = Arc::new(AtomicU64::new(0));

        let worker = tokio::spawn(upload_parts(
            Arc::clone(&client),
            bucket.to_string(),
            key.to_string(),
            receiver,
            Arc::clone(&bytes_uploaded),
        ));

        Self {
            client,
            bucket: bucket.to_string(),
            key: key.to_string(),
            buffer: BytesMut::new(),
            part_size,
            next_part: 1,
            sender: PollSender::new(sender),
            worker: Some(worker),
            failure: None,
            bytes_uploaded,
        }
    }

    /// Hand the buffered bytes to the part uploader.
    fn poll_send_part(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if ready!(self.sender.poll_reserve(cx)).is_err() {
            // The receiver only goes away when the worker returns
            return Poll::Ready(Err(ready!(self.poll_worker_failure(cx))));
        }

        let data = self.buffer.split().freeze();
        let part_number = self.next_part;
        self.next_part += 1;

        self.sender
            .send_item(PartUpload { data, part_number })
            .map_err(|_| upload_channel_closed())?;
        Poll::Ready(Ok(()))
    }

    /// Join a worker that stopped early and turn its error into a write error.
    fn poll_worker_failure(&mut self, cx: &mut Context<'_>) -> Poll<io::Error> {
        if let Some(worker) = self.worker.as_mut() {
            let joined = ready!(Pin::new(worker).poll(cx));
            self.worker = None;
            self.failure = Some(match joined {
                Ok(Err(e)) => format!("{:#}", e),
                Ok(Ok(_)) => format!("Part uploader for {} stopped before the upload finished", self.key),
                Err(e) => format!("Part upload task failed: {}", e),
            });
        }

        Poll::Ready(match &self.failure {
            Some(cause) => io::Error::new(io::ErrorKind::BrokenPipe, cause.clone()),
            None => upload_channel_closed(),
        })
    }

    async fn finish_upload(self) -> Result<()> {
        let S3UploadStream {
            client,
            bucket,
            key,
            mut buffer,
            mut sender,
            worker,
            failure,
            next_part,
            bytes_uploaded,
            ..
        } = self;

        if next_part == 1 {
            // Nothing was handed to the worker: the whole object is in the buffer
            sender.close();
            join_worker(worker, failure).await?;

            let size = buffer.len() as u64;
            put_object(&client, &bucket, &key, buffer.freeze()).await?;
            bytes_uploaded.fetch_add(size, Ordering::SeqCst);
            debug!("Uploaded s3://{}/{} with a single request ({} bytes)", bucket, key, size);
            return Ok(());
        }

        let mut final_part_queued = true;
        if !buffer.is_empty() {
            final_part_queued = match poll_fn(|cx| sender.poll_reserve(cx)).await {
                Ok(()) => sender
                    .send_item(PartUpload {
                        data: buffer.split().freeze(),
                        part_number: next_part,
                    })
                    .is_ok(),
                Err(_) => false,
            };
        }
        sender.close();

        // A failed worker reports its own error here
        let upload = join_worker(worker, failure)
            .await?
            .ok_or_else(|| anyhow!("No multipart upload was started for {}", key))?;
        if !final_part_queued {
            abort_multipart(&client, &bucket, &key, &upload.upload_id).await?;
            return Err(anyhow!("Final part of {} could not be queued", key));
        }

        let mut parts = upload.parts;
        parts.sort_by_key(|part| part.part_number);

        let complete_request = CompleteMultipartUploadRequest {
            bucket: bucket.clone(),
            key: key.clone(),
            upload_id: upload.upload_id.clone(),
            multipart_upload: Some(CompletedMultipartUpload { parts: Some(parts) }),
            ..Default::default()
        };

        if let Err(e) = client.complete_multipart_upload(complete_request).await {
            if let Err(abort_err) = abort_multipart(&client, &bucket, &key, &upload.upload_id).await {
                warn!("Failed to abort multipart upload for {}: {:#}", key, abort_err);
            }
            return Err(anyhow!("Failed to complete multipart upload for {}: {}", key, e));
        }

        debug!("Completed multipart upload for s3://{}/{}", bucket, key);
        Ok(())
    }

    async fn abort_upload(self) -> Result<()> {
        let S3UploadStream {
            client,
            bucket,
            key,
            mut sender,
            worker,
            failure,
            ..
        } = self;

        sender.close();
        let Some(worker) = worker else {
            // The worker aborts the multipart upload itself before failing
            debug!("Part uploader for {} had already failed: {}", key, failure.unwrap_or_default());
            return Ok(());
        };
        match worker.await {
            Ok(Ok(Some(upload))) => {
                abort_multipart(&client, &bucket, &key, &upload.upload_id).await?;
                debug!("Aborted multipart upload for s3://{}/{}", bucket, key);
            }
            Ok(Ok(None)) => {}
            // The worker aborts the multipart upload itself before failing
            Ok(Err(e)) => debug!("Part uploader for {} had already failed: {:#}", key, e),
            Err(e) => warn!("Part upload task for {} did not finish: {}", key, e),
        }
        Ok(())
    }
}

#[async_trait]
impl StreamingTarget for S3UploadStream {
    fn target_name(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded.load(Ordering::SeqCst)
    }

    async fn complete(self) -> Result<()> {
        self.finish_upload().await
    }

    async fn abort(self) -> Result<()> {
        self.abort_upload().await
    }
}

impl AsyncWrite for S3UploadStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;

        if this.buffer.len() >= this.part_size {
            ready!(this.poll_send_part(cx))?;
        }

        let room = this.part_size - this.buffer.len();
        let n = buf.len().min(room);
        this.buffer.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Parts are flushed when full; the remainder is sent by `complete`
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn upload_channel_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "Upload channel closed")
}

fn retry_delay(attempt: usize) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt as u32))
}

async fn join_worker(worker: Option<JoinHandle<WorkerResult>>, failure: Option<String>) -> WorkerResult {
    match worker {
        Some(worker) => worker
            .await
            .map_err(|e| anyhow!("Part upload task failed: {}", e))?,
        None => Err(anyhow!(failure.unwrap_or_else(|| "Part uploader already stopped".to_string()))),
    }
}

/// Background task: uploads queued parts in order, creating the multipart
/// upload when the first part arrives.
async fn upload_parts(
    client: Arc<S3Client>,
    bucket: String,
    key: String,
    mut receiver: mpsc::Receiver<PartUpload>,
    bytes_uploaded: Arc<AtomicU64>,
) -> WorkerResult {
    let mut multipart: Option<MultipartUpload> = None;

    while let Some(part) = receiver.recv().await {
        if multipart.is_none() {
            let upload_id = create_multipart(&client, &bucket, &key).await?;
            multipart = Some(MultipartUpload {
                upload_id,
                parts: Vec::new(),
            });
        }
        let Some(upload) = multipart.as_mut() else {
            continue;
        };

        let part_size = part.data.len() as u64;
        match upload_part(&client, &bucket, &key, &upload.upload_id, &part).await {
            Ok(completed) => {
                upload.parts.push(completed);
                bytes_uploaded.fetch_add(part_size, Ordering::SeqCst);
            }
            Err(e) => {
                if let Err(abort_err) = abort_multipart(&client, &bucket, &key, &upload.upload_id).await {
                    warn!("Failed to abort multipart upload for {}: {:#}", key, abort_err);
                }
                return Err(e);
            }
        }
    }

    Ok(multipart)
}

async fn create_multipart(client: &S3Client, bucket: &str, key: &str) -> Result<String> {
    let create_result = client
        .create_multipart_upload(CreateMultipartUploadRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            ..Default::default()
        })
        .await
        .context("Failed to create multipart upload")?;

    let upload_id = create_result
        .upload_id
        .ok_or_else(|| anyhow!("No upload ID returned from S3"))?;

    debug!("Started multipart upload with ID: {} for {}", upload_id, key);
    Ok(upload_id)
}

async fn upload_part(
    client: &S3Client,
    bucket: &str,
    key: &str,
    upload_id: &str,
    part: &PartUpload,
) -> Result<CompletedPart> {
    let mut attempts = 0;

    loop {
        attempts += 1;

        let request = UploadPartRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            part_number: part.part_number,
            content_length: Some(part.data.len() as i64),
            body: Some(ByteStream::from(part.data.to_vec())),
            ..Default::default()
        };

        match client.upload_part(request).await {
            Ok(output) => {
                let e_tag = output
                    .e_tag
                    .ok_or_else(|| anyhow!("No ETag in upload part response"))?;
                return Ok(CompletedPart {
                    e_tag: Some(e_tag),
                    part_number: Some(part.part_number),
                });
            }
            Err(e) => {
                if attempts >= MAX_UPLOAD_RETRIES {
                    return Err(anyhow!(
                        "Failed to upload part {} after {} attempts: {}",
                        part.part_number,
                        MAX_UPLOAD_RETRIES,
                        e
                    ));
                }

                let delay = retry_delay(attempts);
                warn!(
                    "Part {} upload attempt {} failed, retrying in {:?}: {}",
                    part.part_number, attempts, delay, e
                );
                sleep(delay).await;
            }
        }
    }
}

async fn put_object(client: &S3Client, bucket: &str, key: &str, data: Bytes) -> Result<()> {
    let mut attempts = 0;

    loop {
        attempts += 1;

        let request = PutObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_length: Some(data.len() as i64),
            body: Some(ByteStream::from(data.to_vec())),
            ..Default::default()
        };

        match client.put_object(request).await {
            Ok(_) => return Ok(()),
            Err(e) => {
                if attempts >= MAX_UPLOAD_RETRIES {
                    return Err(anyhow!(
                        "Failed to upload to S3 after {} attempts: {}",
                        MAX_UPLOAD_RETRIES,
                        e
                    ));
                }

                let delay = retry_delay(attempts);
                warn!("S3 upload attempt {} failed, retrying in {:?}: {}", attempts, delay, e);
                sleep(delay).await;
            }
        }
    }
}

async fn abort_multipart(client: &S3Client, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
    client
        .abort_multipart_upload(AbortMultipartUploadRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            ..Default::default()
        })
        .await
        .context("Failed to abort multipart upload")?;
    Ok(())
}
