//! Harness integration: chain wiring, transport pumps, speech-signal
//! feedback, hybrid injection, and clean teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use intake_agent_core::{
    AudioChunk, Frame, FrameProcessor, MediaSink, MediaSource, ProcessorContext, Result,
    SpeechToText, TextToSpeech, TranscriptEvent, TransportEvent,
};
use intake_agent_pipeline::{
    CallOutcome, CallPipeline, PipelineConfig, ProcessorChain, SttAdapter, TtsAdapter,
};

/// Recognizer that yields one scripted final transcript per audio chunk
struct ScriptedStt {
    scripts: Mutex<Vec<String>>,
}

impl ScriptedStt {
    fn new(scripts: &[&str]) -> Self {
        Self {
            scripts: Mutex::new(scripts.iter().rev().map(|s| s.to_string()).collect()),
        }
    }

    fn silent() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn feed(&self, _audio: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn drain(&self) -> Vec<TranscriptEvent> {
        match self.scripts.lock().pop() {
            Some(text) => vec![TranscriptEvent {
                text,
                is_final: true,
                confidence: Some(0.9),
            }],
            None => vec![],
        }
    }

    fn name(&self) -> &str {
        "scripted-stt"
    }
}

/// Recognizer variant for the direct path: transcripts come out of `feed`
struct DirectScriptedStt {
    scripts: Mutex<Vec<String>>,
    pending: Mutex<Vec<TranscriptEvent>>,
}

impl DirectScriptedStt {
    fn new(scripts: &[&str]) -> Self {
        Self {
            scripts: Mutex::new(scripts.iter().rev().map(|s| s.to_string()).collect()),
            pending: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpeechToText for DirectScriptedStt {
    async fn feed(&self, _audio: &[u8]) -> Result<()> {
        if let Some(text) = self.scripts.lock().pop() {
            self.pending.lock().push(TranscriptEvent {
                text,
                is_final: true,
                confidence: Some(0.85),
            });
        }
        Ok(())
    }

    async fn drain(&self) -> Vec<TranscriptEvent> {
        self.pending.lock().drain(..).collect()
    }

    fn name(&self) -> &str {
        "direct-scripted-stt"
    }
}

struct FixedTts;

#[async_trait]
impl TextToSpeech for FixedTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<AudioChunk>> {
        Ok(vec![AudioChunk::new(text.as_bytes().to_vec())])
    }

    fn name(&self) -> &str {
        "fixed-tts"
    }
}

/// Minimal controller stand-in: greets on start, echoes transcripts, hangs
/// up on "goodbye"
struct EchoController;

#[async_trait]
impl FrameProcessor for EchoController {
    async fn process(&self, frame: Frame, _context: &mut ProcessorContext) -> Result<Vec<Frame>> {
        match frame {
            Frame::StreamStart => Ok(vec![
                Frame::StreamStart,
                Frame::Utterance {
                    text: "Welcome.".into(),
                    segment: 0,
                },
            ]),
            Frame::FinalTranscript { text, .. } => {
                if text == "goodbye" {
                    Ok(vec![Frame::StreamEnd])
                } else {
                    Ok(vec![Frame::Utterance {
                        text: format!("You said {text}."),
                        segment: 0,
                    }])
                }
            }
            Frame::SpeechStarted | Frame::SpeechStopped | Frame::AudioChunk(_) => Ok(vec![]),
            other => Ok(vec![other]),
        }
    }

    fn name(&self) -> &'static str {
        "echo_controller"
    }
}

struct ChannelSource {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl MediaSource for ChannelSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

#[derive(Clone, Default)]
struct CollectingSink {
    audio: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl MediaSink for CollectingSink {
    async fn send_audio(&mut self, chunk: AudioChunk) -> Result<()> {
        self.audio.lock().push(chunk.payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn chain_with(stt: Arc<dyn SpeechToText>) -> ProcessorChain {
    ProcessorChain::builder("test_call")
        .processor(SttAdapter::new(stt))
        .processor(EchoController)
        .processor(TtsAdapter::new(Arc::new(FixedTts), Duration::from_millis(1)))
        .build()
}

fn media(byte: u8) -> TransportEvent {
    TransportEvent::Media(AudioChunk::new(vec![byte; 160]))
}

#[tokio::test]
async fn call_flows_end_to_end_and_finishes_on_transport_stop() {
    let (tx, rx) = mpsc::channel(16);
    let sink = CollectingSink::default();
    let sink_audio = sink.audio.clone();
    let sink_closed = sink.closed.clone();

    let pipeline = CallPipeline::new(
        "CA-pipe-1",
        chain_with(Arc::new(ScriptedStt::new(&["hello"]))),
        PipelineConfig {
            enable_direct_stt: false,
            ..Default::default()
        },
    );

    let run = tokio::spawn(pipeline.run(
        Box::new(ChannelSource { rx }),
        Box::new(sink),
        None,
    ));

    tx.send(TransportEvent::Connected {
        call_id: "CA-pipe-1".into(),
        stream_id: Some("MZ1".into()),
    })
    .await
    .unwrap();
    tx.send(media(1)).await.unwrap();

    // Greeting and the echo response both reach the caller as audio
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            {
                let audio = sink_audio.lock();
                let has_greeting = audio.iter().any(|a| a == b"Welcome.");
                let has_echo = audio.iter().any(|a| a == b"You said hello.");
                if has_greeting && has_echo {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("expected greeting and echo audio");

    tx.send(TransportEvent::Stopped).await.unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, CallOutcome::Finished);
    assert!(sink_closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn controller_hangup_finishes_the_call() {
    let (tx, rx) = mpsc::channel(16);
    let sink = CollectingSink::default();

    let pipeline = CallPipeline::new(
        "CA-pipe-2",
        chain_with(Arc::new(ScriptedStt::new(&["goodbye"]))),
        PipelineConfig {
            enable_direct_stt: false,
            ..Default::default()
        },
    );

    let run = tokio::spawn(pipeline.run(Box::new(ChannelSource { rx }), Box::new(sink), None));

    tx.send(media(1)).await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("pipeline should end without a transport stop")
        .unwrap();
    assert_eq!(outcome, CallOutcome::Finished);
}

#[tokio::test]
async fn direct_path_transcripts_reach_the_controller() {
    let (tx, rx) = mpsc::channel(16);
    let sink = CollectingSink::default();
    let sink_audio = sink.audio.clone();

    // Primary recognizer stays silent; only the direct path hears the caller
    let pipeline = CallPipeline::new(
        "CA-pipe-3",
        chain_with(Arc::new(ScriptedStt::silent())),
        PipelineConfig {
            enable_direct_stt: true,
            keepalive_idle: Duration::from_secs(60),
            ..Default::default()
        },
    );

    let direct: Arc<dyn SpeechToText> = Arc::new(DirectScriptedStt::new(&["from the tap"]));
    let run = tokio::spawn(pipeline.run(
        Box::new(ChannelSource { rx }),
        Box::new(sink),
        Some(direct),
    ));

    tx.send(media(7)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if sink_audio
                .lock()
                .iter()
                .any(|a| a == b"You said from the tap.")
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("expected direct-path transcript to be spoken back");

    tx.send(TransportEvent::Stopped).await.unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, CallOutcome::Finished);
}
