use casedocs::grouping::{
    NUMERIC_BASE_PREFIX, SupportedExtensions, discover_cases, group_batch, group_case,
    group_filenames, parse_page_name,
};
use casedocs::types::Case;
use std::fs;
use std::path::Path;

use test_utils::{setup_batch, write_page};

fn group(files: &[&str]) -> Vec<(String, Vec<u32>)> {
    group_filenames("C1", Path::new("/cases/C1"), files, &SupportedExtensions::default())
        .into_iter()
        .map(|g| {
            let pages = g.pages.iter().map(|p| p.page_number).collect();
            (g.base_name, pages)
        })
        .collect()
}

#[test]
fn test_invoice_pages_group_together() {
    let groups = group(&["Invoice 1.pdf", "Invoice 2.pdf", "CRL 1.pdf"]);
    assert_eq!(
        groups,
        vec![
            ("CRL".to_string(), vec![1]),
            ("Invoice".to_string(), vec![1, 2]),
        ]
    );
}

#[test]
fn test_pages_sorted_numerically_not_lexically() {
    let groups = group(&["Bill_10.png", "Bill_2.png", "Bill_1.png"]);
    assert_eq!(groups, vec![("Bill".to_string(), vec![1, 2, 10])]);
}

#[test]
fn test_grouping_ignores_input_order() {
    let mut files = vec![
        "Invoice page3.pdf",
        "Invoice 1.pdf",
        "Packing List_2.jpg",
        "Invoice_2.pdf",
        "Packing List 1.jpg",
        "cover.pdf",
    ];
    let expected = group(&files);
    files.reverse();
    assert_eq!(group(&files), expected);
    files.swap(0, 3);
    files.swap(1, 5);
    assert_eq!(group(&files), expected);
}

#[test]
fn test_every_supported_file_lands_in_exactly_one_group() {
    let files = [
        "A 1.pdf", "A 2.pdf", "B.pdf", "7.pdf", "notes.txt", "C_4.tiff", "scan.WEBP",
    ];
    let groups = group_filenames(
        "C1",
        Path::new("/cases/C1"),
        &files,
        &SupportedExtensions::default(),
    );
    let mut seen: Vec<&str> = groups.iter().flat_map(|g| g.file_names()).collect();
    seen.sort_unstable();
    assert_eq!(
        seen,
        vec!["7.pdf", "A 1.pdf", "A 2.pdf", "B.pdf", "C_4.tiff", "scan.WEBP"]
    );
    assert!(groups.iter().all(|g| !g.pages.is_empty()));
    assert!(groups.iter().all(|g| g.case_id == "C1"));
}

#[test]
fn test_numeric_and_unnumbered_names() {
    assert_eq!(parse_page_name("Contract"), ("Contract".to_string(), 1));
    assert_eq!(
        parse_page_name("12"),
        (format!("{NUMERIC_BASE_PREFIX}12"), 1)
    );
    let groups = group(&["1.pdf", "2.pdf"]);
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|(base, pages)| base.starts_with(NUMERIC_BASE_PREFIX) && pages == &[1]));
}

#[test]
fn test_mime_types_follow_extension() {
    let groups = group_filenames(
        "C1",
        Path::new("/cases/C1"),
        &["Photo 1.JPG", "Photo 2.png"],
        &SupportedExtensions::default(),
    );
    let mimes: Vec<&str> = groups[0].pages.iter().map(|p| p.mime_type.as_str()).collect();
    assert_eq!(mimes, vec!["image/jpeg", "image/png"]);
}

#[test]
fn test_custom_extensions_limit_pickup() {
    let supported = SupportedExtensions::new([("pdf", "application/pdf")]);
    let groups = group_filenames("C1", Path::new("/c"), &["A 1.pdf", "A 2.png"], &supported);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].file_names(), vec!["A 1.pdf"]);
}

#[test]
fn test_discover_cases_sorted_and_dirs_only() {
    let batch = setup_batch(&[("CASE_B", &["Invoice 1.pdf"]), ("CASE_A", &[])]);
    write_page(batch.path(), "stray.pdf");
    fs::create_dir(batch.path().join(".hidden")).expect("Failed to create hidden dir");

    let cases = discover_cases(batch.path()).expect("discover cases");
    let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["CASE_A", "CASE_B"]);
}

#[test]
fn test_discover_cases_requires_case_folders() {
    let batch = setup_batch(&[]);
    let err = discover_cases(batch.path()).expect_err("empty batch must fail");
    assert!(err.to_string().contains("No case folders found"));
}

#[test]
fn test_group_case_reads_directory() {
    let batch = setup_batch(&[("C1", &["Invoice 2.pdf", "Invoice 1.pdf", "readme.md"])]);
    let case = Case::new("C1", batch.path().join("C1"));
    let groups = group_case(&case, &SupportedExtensions::default()).expect("group case");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].file_names(), vec!["Invoice 1.pdf", "Invoice 2.pdf"]);
    assert_eq!(groups[0].pages[0].path, batch.path().join("C1").join("Invoice 1.pdf"));
}

#[test]
fn test_group_batch_skips_empty_cases() {
    let batch = setup_batch(&[
        ("C1", &["Invoice 1.pdf", "CRL 1.pdf"]),
        ("C2", &["notes.txt"]),
        ("C3", &["BL 1.pdf"]),
    ]);
    let groups = group_batch(batch.path(), &SupportedExtensions::default()).expect("group batch");
    let keys: Vec<String> = groups.iter().map(|g| g.key().to_string()).collect();
    assert_eq!(keys, vec!["C1/CRL", "C1/Invoice", "C3/BL"]);
}
