use super::*;
use anyhow::anyhow;
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingTranscriber {
    seen: Mutex<Vec<usize>>,
}

impl ImageTranscriber for RecordingTranscriber {
    fn transcribe(&self, image: &[u8]) -> Result<String> {
        self.seen.lock().expect("should lock").push(image.len());
        Ok("Tabela de tarifas da praça P1".to_string())
    }
}

struct FailingTranscriber;

impl ImageTranscriber for FailingTranscriber {
    fn transcribe(&self, _image: &[u8]) -> Result<String> {
        Err(anyhow!("model not loaded"))
    }
}

#[test]
fn image_is_sent_to_transcriber() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("tabela.PNG");
    std::fs::write(&path, [0x89, b'P', b'N', b'G']).expect("should write image");

    let transcriber = Arc::new(RecordingTranscriber::default());
    let loader = ImageLoader::new(Arc::clone(&transcriber) as Arc<dyn ImageTranscriber>);
    let docs = loader.load(&path).expect("should load image");

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].content, "Tabela de tarifas da praça P1");
    assert_eq!(docs[0].metadata.content_type, "image/png");
    assert_eq!(*transcriber.seen.lock().expect("should lock"), vec![4]);
}

#[test]
fn transcriber_failure_is_reported() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("foto.jpg");
    std::fs::write(&path, [0xFF, 0xD8, 0xFF]).expect("should write image");

    let loader = ImageLoader::new(Arc::new(FailingTranscriber));
    let err = loader.load(&path).expect_err("should fail");
    assert!(format!("{:#}", err).contains("model not loaded"));
}

#[test]
fn empty_image_is_rejected() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("vazio.jpeg");
    std::fs::write(&path, b"").expect("should write image");

    let loader = ImageLoader::new(Arc::new(FailingTranscriber));
    assert!(loader.load(&path).is_err());
}
