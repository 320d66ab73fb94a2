//! Ordered audio delivery with buffering across disconnects.

use crate::error::{Result, VoxwireError};
use crate::protocol::encoder::FrameEncoder;
use crate::transport::FrameSender;
use std::collections::VecDeque;

/// One chunk of PCM audio submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub bytes: Vec<u8>,
    pub is_last: bool,
}

impl AudioChunk {
    pub fn new(bytes: Vec<u8>, is_last: bool) -> Self {
        Self { bytes, is_last }
    }

    /// Empty last-marked chunk synthesized by `stop()`.
    pub fn end_of_stream() -> Self {
        Self {
            bytes: Vec::new(),
            is_last: true,
        }
    }
}

/// FIFO of chunks waiting for a usable connection.
#[derive(Debug, Default)]
pub struct PendingAudioQueue {
    chunks: VecDeque<AudioChunk>,
}

impl PendingAudioQueue {
    pub fn push_back(&mut self, chunk: AudioChunk) {
        self.chunks.push_back(chunk);
    }

    /// Put a chunk whose send failed back at the head.
    pub fn push_front(&mut self, chunk: AudioChunk) {
        self.chunks.push_front(chunk);
    }

    pub fn pop_front(&mut self) -> Option<AudioChunk> {
        self.chunks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Total buffered audio bytes.
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(|c| c.bytes.len()).sum()
    }
}

/// What happened to a submitted chunk.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Framed and handed to the transport (together with anything queued before it).
    Sent,
    /// Buffered until the connection is ready.
    Queued,
    /// The chunk could not be framed or the transport failed; the chunk and
    /// everything after it stay queued.
    SendFailed(VoxwireError),
}

/// Buffers, frames and transmits audio in submission order.
#[derive(Debug, Default)]
pub struct AudioSendPipeline {
    queue: PendingAudioQueue,
    last_accepted: bool,
    last_sent: bool,
    frames_sent: u64,
}

impl AudioSendPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a chunk. With a ready `link` it is transmitted right away,
    /// behind any chunks still queued; without one it is buffered.
    ///
    /// # Errors
    /// Returns `VoxwireError::InvalidState` once a last-marked chunk has
    /// been accepted. Transport failures are reported through
    /// [`SubmitOutcome::SendFailed`] because the chunk itself is retained.
    pub async fn submit(
        &mut self,
        chunk: AudioChunk,
        encoder: &mut FrameEncoder,
        link: Option<&mut dyn FrameSender>,
    ) -> Result<SubmitOutcome> {
        if self.last_accepted {
            return Err(VoxwireError::InvalidState {
                operation: "send_audio".to_string(),
                state: "audio stream already finished".to_string(),
            });
        }
        if chunk.is_last {
            self.last_accepted = true;
        }

        match link {
            Some(link) => {
                self.queue.push_back(chunk);
                match self.flush_on_ready(encoder, link).await {
                    Ok(_) => Ok(SubmitOutcome::Sent),
                    Err(e) => Ok(SubmitOutcome::SendFailed(e)),
                }
            }
            None => {
                self.queue.push_back(chunk);
                Ok(SubmitOutcome::Queued)
            }
        }
    }

    /// Drain the queue in order over `link`. Returns the number of frames sent.
    ///
    /// A chunk that fails to frame or send goes back at the head and the
    /// drain stops, so the next flush resumes with it.
    pub async fn flush_on_ready(
        &mut self,
        encoder: &mut FrameEncoder,
        link: &mut dyn FrameSender,
    ) -> Result<usize> {
        let mut sent = 0;
        while let Some(chunk) = self.queue.pop_front() {
            let frame = match encoder.audio_frame(&chunk.bytes, chunk.is_last) {
                Ok(frame) => frame,
                Err(e) => {
                    self.queue.push_front(chunk);
                    return Err(e);
                }
            };
            if let Err(e) = link.send(frame).await {
                self.queue.push_front(chunk);
                return Err(e);
            }
            if chunk.is_last {
                self.last_sent = true;
            }
            self.frames_sent += 1;
            sent += 1;
        }
        Ok(sent)
    }

    /// A last-marked chunk has been accepted (sent or queued).
    pub fn last_accepted(&self) -> bool {
        self.last_accepted
    }

    /// The last-marked chunk has been handed to the transport.
    pub fn last_sent(&self) -> bool {
        self.last_sent
    }

    pub fn pending(&self) -> &PendingAudioQueue {
        &self.queue
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Forget everything for a new session.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.last_accepted = false;
        self.last_sent = false;
        self.frames_sent = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::protocol::compression::CompressionPolicy;
    use crate::protocol::frame::decode_frame;
    use std::sync::Arc;

    /// Sender that records frames and fails on chosen send attempts.
    #[derive(Default)]
    struct RecordingSender {
        frames: Vec<Vec<u8>>,
        attempts: usize,
        fail_on: Vec<usize>,
    }

    #[async_trait::async_trait]
    impl FrameSender for RecordingSender {
        async fn send(&mut self, frame: Vec<u8>) -> Result<()> {
            let attempt = self.attempts;
            self.attempts += 1;
            if self.fail_on.contains(&attempt) {
                return Err(VoxwireError::transient("scripted failure"));
            }
            self.frames.push(frame);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl RecordingSender {
        fn payloads(&self) -> Vec<Vec<u8>> {
            self.frames
                .iter()
                .map(|f| decode_frame(f).unwrap().payload)
                .collect()
        }
    }

    fn encoder() -> FrameEncoder {
        FrameEncoder::new(CompressionPolicy::none(), Arc::new(MemoryLog::new()))
    }

    fn chunk(bytes: &[u8]) -> AudioChunk {
        AudioChunk::new(bytes.to_vec(), false)
    }

    #[tokio::test]
    async fn test_chunks_buffer_while_link_is_down() {
        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder();

        for c in [b"a", b"b", b"c"] {
            let outcome = pipeline.submit(chunk(c), &mut enc, None).await.unwrap();
            assert!(matches!(outcome, SubmitOutcome::Queued));
        }
        assert_eq!(pipeline.pending().len(), 3);
        assert_eq!(pipeline.pending().byte_len(), 3);
    }

    #[tokio::test]
    async fn test_flush_preserves_submission_order() {
        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder();
        for c in [b"a", b"b", b"c"] {
            pipeline.submit(chunk(c), &mut enc, None).await.unwrap();
        }

        let mut link = RecordingSender::default();
        let sent = pipeline.flush_on_ready(&mut enc, &mut link).await.unwrap();

        assert_eq!(sent, 3);
        assert_eq!(
            link.payloads(),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        assert!(pipeline.pending().is_empty());
    }

    #[tokio::test]
    async fn test_failure_mid_drain_requeues_remaining_in_order() {
        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder();
        for c in [b"a", b"b", b"c"] {
            pipeline.submit(chunk(c), &mut enc, None).await.unwrap();
        }

        let mut link = RecordingSender {
            fail_on: vec![1],
            ..Default::default()
        };
        let err = pipeline.flush_on_ready(&mut enc, &mut link).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(link.payloads(), vec![b"a".to_vec()]);
        assert_eq!(pipeline.pending().len(), 2);

        let mut retry = RecordingSender::default();
        pipeline.flush_on_ready(&mut enc, &mut retry).await.unwrap();
        assert_eq!(retry.payloads(), vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn test_direct_send_when_ready() {
        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder();
        let mut link = RecordingSender::default();

        let outcome = pipeline
            .submit(chunk(b"x"), &mut enc, Some(&mut link))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Sent));
        assert_eq!(link.frames.len(), 1);
        assert_eq!(pipeline.frames_sent(), 1);
    }

    #[tokio::test]
    async fn test_ready_submit_goes_behind_queued_chunks() {
        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder();
        pipeline.submit(chunk(b"old"), &mut enc, None).await.unwrap();

        let mut link = RecordingSender::default();
        pipeline
            .submit(chunk(b"new"), &mut enc, Some(&mut link))
            .await
            .unwrap();
        assert_eq!(link.payloads(), vec![b"old".to_vec(), b"new".to_vec()]);
    }

    #[tokio::test]
    async fn test_failed_direct_send_keeps_chunk() {
        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder();
        let mut link = RecordingSender {
            fail_on: vec![0],
            ..Default::default()
        };

        let outcome = pipeline
            .submit(chunk(b"x"), &mut enc, Some(&mut link))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::SendFailed(_)));
        assert_eq!(pipeline.pending().len(), 1);
        assert!(link.frames.is_empty());
    }

    #[tokio::test]
    async fn test_last_chunk_is_sent_once_and_closes_stream() {
        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder();
        let mut link = RecordingSender::default();

        pipeline
            .submit(AudioChunk::end_of_stream(), &mut enc, Some(&mut link))
            .await
            .unwrap();
        assert!(pipeline.last_accepted());
        assert!(pipeline.last_sent());

        let again = pipeline
            .submit(AudioChunk::end_of_stream(), &mut enc, Some(&mut link))
            .await;
        assert!(matches!(again, Err(VoxwireError::InvalidState { .. })));
        assert_eq!(link.frames.len(), 1);

        let frame = decode_frame(&link.frames[0]).unwrap();
        assert!(frame.sequence.unwrap() < 0);
        assert!(frame.payload.is_empty());
    }

    #[tokio::test]
    async fn test_queued_last_chunk_is_not_sent_until_flush() {
        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder();
        pipeline
            .submit(AudioChunk::new(b"tail".to_vec(), true), &mut enc, None)
            .await
            .unwrap();
        assert!(pipeline.last_accepted());
        assert!(!pipeline.last_sent());

        let mut link = RecordingSender::default();
        pipeline.flush_on_ready(&mut enc, &mut link).await.unwrap();
        assert!(pipeline.last_sent());
    }

    #[tokio::test]
    async fn test_exhausted_sequence_keeps_chunk_queued() {
        use crate::protocol::sequence::SequenceCounter;

        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder().with_counter(SequenceCounter::starting_at(i32::MAX));
        let mut link = RecordingSender::default();

        pipeline
            .submit(chunk(b"a"), &mut enc, Some(&mut link))
            .await
            .unwrap();
        let outcome = pipeline
            .submit(chunk(b"b"), &mut enc, Some(&mut link))
            .await
            .unwrap();

        match outcome {
            SubmitOutcome::SendFailed(e) => assert!(!e.is_transient()),
            other => panic!("expected SendFailed, got {:?}", other),
        }
        assert_eq!(link.payloads(), vec![b"a".to_vec()]);
        assert_eq!(pipeline.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let mut pipeline = AudioSendPipeline::new();
        let mut enc = encoder();
        pipeline
            .submit(AudioChunk::end_of_stream(), &mut enc, None)
            .await
            .unwrap();
        pipeline.reset();
        assert!(!pipeline.last_accepted());
        assert!(pipeline.pending().is_empty());
    }
}
