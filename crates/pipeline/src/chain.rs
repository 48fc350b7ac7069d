//! Channel-connected processor chain
//!
//! Each processor runs in its own tokio task, connected to its neighbors
//! by bounded channels. Frames are processed strictly in arrival order per
//! processor, which is what gives one call its ordering guarantees.

use std::sync::Arc;

use tokio::sync::mpsc;

use intake_agent_core::{Frame, FrameProcessor, ProcessorContext, Result};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

pub struct ProcessorChain {
    name: String,
    processors: Vec<Arc<dyn FrameProcessor>>,
    channel_capacity: usize,
}

impl ProcessorChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processors: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn builder(name: impl Into<String>) -> ProcessorChainBuilder {
        ProcessorChainBuilder::new(name)
    }

    pub fn add<P: FrameProcessor + 'static>(&mut self, processor: P) -> &mut Self {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn add_shared(&mut self, processor: Arc<dyn FrameProcessor>) -> &mut Self {
        self.processors.push(processor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Push a single frame through every processor in order, without
    /// spawning tasks. Useful in tests; streaming callers use [`run`].
    ///
    /// [`run`]: ProcessorChain::run
    pub async fn process_one(
        &self,
        frame: Frame,
        context: &mut ProcessorContext,
    ) -> Result<Vec<Frame>> {
        let mut frames = vec![frame];
        for processor in &self.processors {
            let mut next = Vec::new();
            for f in frames {
                next.extend(processor.process(f, context).await?);
            }
            frames = next;
        }
        Ok(frames)
    }

    /// Start the streaming pipeline.
    ///
    /// Spawns one task per processor and returns the chain's input sender
    /// and output receiver. Processor errors become recoverable
    /// [`Frame::Error`] frames rather than killing the chain.
    pub fn run(&self, initial_context: ProcessorContext) -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
        let (input_tx, input_rx) = mpsc::channel::<Frame>(self.channel_capacity);

        if self.processors.is_empty() {
            let (output_tx, output_rx) = mpsc::channel::<Frame>(self.channel_capacity);
            let mut input_rx = input_rx;
            tokio::spawn(async move {
                while let Some(frame) = input_rx.recv().await {
                    if output_tx.send(frame).await.is_err() {
                        break;
                    }
                }
            });
            return (input_tx, output_rx);
        }

        let mut current_rx = input_rx;

        for processor in &self.processors {
            let processor = Arc::clone(processor);
            let mut context = initial_context.clone();
            let (next_tx, next_rx) = mpsc::channel::<Frame>(self.channel_capacity);

            let mut rx = current_rx;
            let tx = next_tx;
            let processor_name = processor.name();

            tokio::spawn(async move {
                if let Err(e) = processor.on_start(&mut context).await {
                    tracing::error!(processor = processor_name, error = %e, "Processor on_start failed");
                }

                while let Some(frame) = rx.recv().await {
                    let is_eos = frame.is_end_of_stream();

                    match processor.process(frame, &mut context).await {
                        Ok(output_frames) => {
                            for output in output_frames {
                                if tx.send(output).await.is_err() {
                                    tracing::debug!(processor = processor_name, "Output channel closed");
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!(processor = processor_name, error = %e, "Processor error");
                            let _ = tx
                                .send(Frame::Error {
                                    stage: processor_name.to_string(),
                                    message: e.to_string(),
                                    recoverable: true,
                                })
                                .await;
                        }
                    }

                    if is_eos {
                        if let Err(e) = processor.on_stop(&mut context).await {
                            tracing::error!(processor = processor_name, error = %e, "Processor on_stop failed");
                        }
                    }
                }

                tracing::debug!(processor = processor_name, "Processor task exiting");
            });

            current_rx = next_rx;
        }

        (input_tx, current_rx)
    }
}

pub struct ProcessorChainBuilder {
    chain: ProcessorChain,
}

impl ProcessorChainBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            chain: ProcessorChain::new(name),
        }
    }

    pub fn processor<P: FrameProcessor + 'static>(mut self, processor: P) -> Self {
        self.chain.add(processor);
        self
    }

    pub fn processor_shared(mut self, processor: Arc<dyn FrameProcessor>) -> Self {
        self.chain.add_shared(processor);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.chain.channel_capacity = capacity;
        self
    }

    pub fn build(self) -> ProcessorChain {
        self.chain
    }
}

/// Passthrough processor for wiring tests
pub struct PassthroughProcessor {
    name: &'static str,
}

impl PassthroughProcessor {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait::async_trait]
impl FrameProcessor for PassthroughProcessor {
    async fn process(&self, frame: Frame, _context: &mut ProcessorContext) -> Result<Vec<Frame>> {
        Ok(vec![frame])
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_agent_core::TranscriptSource;

    #[tokio::test]
    async fn test_empty_chain_passes_through() {
        let chain = ProcessorChain::new("empty");
        let mut ctx = ProcessorContext::default();
        let frames = chain
            .process_one(Frame::StreamStart, &mut ctx)
            .await
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Frame::StreamStart));
    }

    #[tokio::test]
    async fn test_running_chain_preserves_order() {
        let chain = ProcessorChain::builder("order")
            .processor(PassthroughProcessor::new("p1"))
            .processor(PassthroughProcessor::new("p2"))
            .channel_capacity(16)
            .build();

        let (tx, mut rx) = chain.run(ProcessorContext::new("CA1"));

        tx.send(Frame::StreamStart).await.unwrap();
        for i in 0..5 {
            tx.send(Frame::FinalTranscript {
                text: format!("utterance {i}"),
                confidence: None,
                source: TranscriptSource::Pipeline,
            })
            .await
            .unwrap();
        }
        tx.send(Frame::StreamEnd).await.unwrap();

        let mut texts = Vec::new();
        while let Some(frame) = rx.recv().await {
            let eos = frame.is_end_of_stream();
            if let Frame::FinalTranscript { text, .. } = frame {
                texts.push(text);
            }
            if eos {
                break;
            }
        }
        let expected: Vec<String> = (0..5).map(|i| format!("utterance {i}")).collect();
        assert_eq!(texts, expected);
    }

    #[tokio::test]
    async fn test_builder() {
        let chain = ProcessorChain::builder("built")
            .processor(PassthroughProcessor::new("only"))
            .build();
        assert_eq!(chain.name(), "built");
        assert_eq!(chain.len(), 1);
    }
}
