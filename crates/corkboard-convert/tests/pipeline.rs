//! End-to-end tests over real (synthesized) PDFs: converter, queue, facade
//! and the sandboxed worker binary.

use corkboard_convert::{
    ConversionJob, ConversionQueue, ConversionResult, ConversionService, ConvertConfig,
    ConvertError, DocumentConverter, DocumentTextBundle,
};
use lopdf::{dictionary, Document, Object, Stream};

/// Minimal one-page PDF (US Letter, 612x792) with `text` drawn in Helvetica.
fn create_test_pdf(text: &str) -> Vec<u8> {
    create_multipage_pdf(&[text])
}

fn create_multipage_pdf(page_texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for text in page_texts {
        let content = format!(
            "BT /F1 12 Tf 100 700 Td ({}) Tj ET",
            text.replace('\\', "\\\\")
                .replace('(', "\\(")
                .replace(')', "\\)")
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id);
    }

    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids.iter().map(|&id| id.into()).collect::<Vec<Object>>(),
        "Count" => page_texts.len() as i64,
    });
    for &page_id in &kids {
        if let Ok(Object::Dictionary(ref mut dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }
    }

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn config_for(dir: &tempfile::TempDir) -> ConvertConfig {
    let mut config = ConvertConfig::new(dir.path());
    config.worker_count = 1;
    config
}

fn write_upload(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) {
    std::fs::write(dir.path().join(name), bytes).unwrap();
}

fn job_for(dir: &tempfile::TempDir, id: &str, filename: &str) -> ConversionJob {
    ConversionJob {
        id: id.into(),
        filename: filename.into(),
        source_dir: dir.path().to_path_buf(),
    }
}

fn dir_listing(dir: &tempfile::TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn converts_a_single_page_document() {
    let dir = tempfile::tempdir().unwrap();
    write_upload(&dir, "board-doc.pdf", &create_test_pdf("Hello from Corkboard"));

    let converter = DocumentConverter::new(config_for(&dir));
    let result = converter.process(&job_for(&dir, "doc-1", "board-doc.pdf")).unwrap();

    assert_eq!(result.id, "doc-1");
    assert_eq!(result.file, "board-doc.pdf");
    assert_eq!(result.pages.len(), 1);

    // 612x792 at target 2000: scale floor(2000/792)=2, render width 1224,
    // pyramid 1224 then 612 (306 would be below the floor).
    let page = &result.pages[0];
    assert_eq!(page.page_index, 0);
    let widths: Vec<u32> = page.images.iter().map(|v| v.width).collect();
    assert_eq!(widths, vec![1224, 612]);
    assert_eq!(page.images[0].quality, 70);
    assert_eq!(page.images[1].quality, 75);
    assert_eq!(page.images[0].height, 1584);
    assert_eq!(page.images[0].url, "/assets/board-doc-0-1224.webp");
    assert!(page.text_content.contains("Hello"));

    for variant in &page.images {
        let path = dir.path().join(format!(
            "board-doc-{}-{}.webp",
            page.page_index, variant.width
        ));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, variant.size_bytes);
        // RIFF....WEBP container header.
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    let bundle: DocumentTextBundle =
        serde_json::from_slice(&std::fs::read(dir.path().join("board-doc-text.json")).unwrap())
            .unwrap();
    assert_eq!(bundle.page_count, 1);
    assert!(bundle.pages[0].contains("Hello"));
}

#[test]
fn artifacts_land_next_to_the_upload() {
    // The job's source directory is the single authority for output paths,
    // even when the config points somewhere else.
    let upload_dir = tempfile::tempdir().unwrap();
    let other_dir = tempfile::tempdir().unwrap();
    write_upload(&upload_dir, "board-doc.pdf", &create_test_pdf("co-located"));

    let converter = DocumentConverter::new(config_for(&other_dir));
    let result = converter
        .process(&job_for(&upload_dir, "doc-9", "board-doc.pdf"))
        .unwrap();

    assert_eq!(result.pages.len(), 1);
    assert!(upload_dir.path().join("board-doc-0-1224.webp").exists());
    assert!(upload_dir.path().join("board-doc-text.json").exists());
    assert_eq!(dir_listing(&other_dir), Vec::<String>::new());
}

#[test]
fn zero_page_documents_produce_an_empty_bundle() {
    let dir = tempfile::tempdir().unwrap();
    write_upload(&dir, "empty.pdf", &create_multipage_pdf(&[]));

    let converter = DocumentConverter::new(config_for(&dir));
    let result = converter.process(&job_for(&dir, "doc-10", "empty.pdf")).unwrap();

    assert!(result.pages.is_empty());
    let bundle: DocumentTextBundle =
        serde_json::from_slice(&std::fs::read(dir.path().join("empty-text.json")).unwrap())
            .unwrap();
    assert_eq!(bundle.page_count, 0);
    assert!(bundle.pages.is_empty());
    // The bundle is the only artifact; no variant images for zero pages.
    assert_eq!(
        dir_listing(&dir),
        vec!["empty-text.json".to_string(), "empty.pdf".to_string()]
    );
}

#[test]
fn multipage_documents_keep_page_order() {
    let dir = tempfile::tempdir().unwrap();
    write_upload(
        &dir,
        "slides.pdf",
        &create_multipage_pdf(&["alpha page", "bravo page", "charlie page"]),
    );

    let converter = DocumentConverter::new(config_for(&dir));
    let result = converter.process(&job_for(&dir, "doc-2", "slides.pdf")).unwrap();

    assert_eq!(result.pages.len(), 3);
    for (index, page) in result.pages.iter().enumerate() {
        assert_eq!(page.page_index, index);
        assert!(!page.images.is_empty());
    }
    assert!(result.pages[1].text_content.contains("bravo"));

    let bundle: DocumentTextBundle =
        serde_json::from_slice(&std::fs::read(dir.path().join("slides-text.json")).unwrap())
            .unwrap();
    assert_eq!(bundle.page_count, 3);
    assert!(bundle.pages[2].contains("charlie"));
}

#[test]
fn reprocessing_overwrites_the_same_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    write_upload(&dir, "board-doc.pdf", &create_test_pdf("stable output"));

    let converter = DocumentConverter::new(config_for(&dir));
    let job = job_for(&dir, "doc-3", "board-doc.pdf");
    converter.process(&job).unwrap();
    let first = dir_listing(&dir);
    converter.process(&job).unwrap();
    let second = dir_listing(&dir);

    assert_eq!(first, second);
}

#[test]
fn unparseable_input_fails_without_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    write_upload(&dir, "broken.pdf", b"this is not a pdf at all");

    let converter = DocumentConverter::new(config_for(&dir));
    let err = converter
        .process(&job_for(&dir, "doc-4", "broken.pdf"))
        .unwrap_err();

    assert!(matches!(err, ConvertError::DocumentParse(_)), "got {err}");
    // Only the source upload remains; no variants, no text bundle.
    assert_eq!(dir_listing(&dir), vec!["broken.pdf".to_string()]);
}

#[test]
fn missing_source_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let converter = DocumentConverter::new(config_for(&dir));
    let err = converter
        .process(&job_for(&dir, "doc-5", "nope.pdf"))
        .unwrap_err();
    assert!(matches!(err, ConvertError::Io(_)), "got {err}");
}

fn canned_result(job: &ConversionJob) -> Result<ConversionResult, ConvertError> {
    Ok(ConversionResult {
        id: job.id.clone(),
        file: job.filename.clone(),
        pages: Vec::new(),
    })
}

#[tokio::test]
async fn jobs_enqueued_before_a_processor_are_buffered() {
    let dir = tempfile::tempdir().unwrap();
    let queue = ConversionQueue::new("buffering-test", 2);
    let handle = queue.add_task(job_for(&dir, "early", "early.pdf")).unwrap();

    queue.add_processor(canned_result).unwrap();
    let result = handle.wait().await.unwrap();
    assert_eq!(result.id, "early");
}

#[tokio::test]
async fn a_queue_accepts_only_one_processor() {
    let queue = ConversionQueue::new("single-processor", 1);
    queue.add_processor(canned_result).unwrap();
    let err = queue.add_processor(canned_result).unwrap_err();
    assert!(matches!(err, ConvertError::ProcessorRegistered), "got {err}");
}

#[tokio::test]
async fn a_panicking_processor_reports_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let queue = ConversionQueue::new("panic-test", 1);
    queue
        .add_processor(|_job| panic!("handler blew up"))
        .unwrap();

    let handle = queue.add_task(job_for(&dir, "doomed", "doomed.pdf")).unwrap();
    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, ConvertError::ProcessCrash(_)), "got {err}");

    // The pool survives the panic and keeps serving.
    let queue2 = ConversionQueue::new("panic-test-followup", 1);
    queue2.add_processor(canned_result).unwrap();
    let ok = queue2
        .add_task(job_for(&dir, "after", "after.pdf"))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(ok.id, "after");
}

#[tokio::test]
async fn a_zero_worker_count_still_gets_one_worker() {
    let dir = tempfile::tempdir().unwrap();
    let queue = ConversionQueue::new("clamped-pool", 0);
    queue.add_processor(canned_result).unwrap();

    let result = queue
        .add_task(job_for(&dir, "clamped", "clamped.pdf"))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(result.id, "clamped");
}

#[tokio::test]
async fn a_dead_worker_process_fails_only_its_job() {
    let dir = tempfile::tempdir().unwrap();
    write_upload(&dir, "victim.pdf", &create_test_pdf("never rendered"));

    // A worker binary that exits non-zero without ever replying.
    let service = ConversionService::sandboxed(config_for(&dir), "/bin/false").unwrap();

    let err = service
        .add_file("doc-11", "victim.pdf")
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::ProcessCrash(_)), "got {err}");

    // The pool task outlives the dead child and keeps serving the queue.
    let err = service
        .add_file("doc-12", "victim.pdf")
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::ProcessCrash(_)), "got {err}");
}

#[tokio::test]
async fn in_process_service_converts_an_upload() {
    let dir = tempfile::tempdir().unwrap();
    write_upload(&dir, "upload.pdf", &create_test_pdf("facade test"));

    let service = ConversionService::in_process(config_for(&dir)).unwrap();
    assert_eq!(service.queue_name(), "document-conversion");

    let handle = service.add_file("doc-6", "upload.pdf").unwrap();
    assert_eq!(handle.job_id(), "doc-6");
    let result = handle.wait().await.unwrap();
    assert_eq!(result.pages.len(), 1);
    assert!(dir.path().join("upload-0-1224.webp").exists());
    assert!(dir.path().join("upload-text.json").exists());
}

#[tokio::test]
async fn sandboxed_service_converts_an_upload() {
    let dir = tempfile::tempdir().unwrap();
    write_upload(&dir, "sandboxed.pdf", &create_test_pdf("isolated render"));

    let worker_bin = env!("CARGO_BIN_EXE_corkboard-convert-worker");
    let service = ConversionService::sandboxed(config_for(&dir), worker_bin).unwrap();

    let result = service
        .add_file("doc-7", "sandboxed.pdf")
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(result.id, "doc-7");
    assert_eq!(result.pages.len(), 1);
    assert!(dir.path().join("sandboxed-0-1224.webp").exists());
}

#[tokio::test]
async fn sandboxed_parse_failures_come_back_typed() {
    let dir = tempfile::tempdir().unwrap();
    write_upload(&dir, "garbage.pdf", b"not a document");

    let worker_bin = env!("CARGO_BIN_EXE_corkboard-convert-worker");
    let service = ConversionService::sandboxed(config_for(&dir), worker_bin).unwrap();

    let err = service
        .add_file("doc-8", "garbage.pdf")
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::DocumentParse(_)), "got {err}");
}
