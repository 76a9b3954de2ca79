//! End-to-end extraction tests against mock district sites.

mod support;

use policy_scraper_core::{
    ExtractError, ExtractOptions, ExtractRequest, Platform, PlatformHint, PolicyMetadata,
    extract_with,
};
use support::socket_guard::start_mock_server_or_skip;
use support::test_fetcher;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_html(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn request(url: &str) -> ExtractRequest {
    ExtractRequest::new(url, ExtractOptions::default()).expect("valid request")
}

#[tokio::test]
async fn test_table_link_listing_end_to_end() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/policies"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><table>
                <tr><th>Name of Policy</th><th>Adopted</th></tr>
                <tr><td><a href="/page/101">1.01 Dress Code</a></td><td>2019</td></tr>
                <tr><td><a href="/page/102">1.02 Attendance</a></td><td>2020</td></tr>
                <tr><td><a href="/files/handbook.pdf">Handbook</a></td><td></td></tr>
            </table></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/page/101",
        200,
        r"<html><body><main>
            <h1>1.01 Dress Code</h1>
            <p>Students shall dress appropriately for school.</p>
            <table>
              <tr><th>Statutory Authority</th><th>Law(s) Implemented</th><th>History</th><th>Notes</th></tr>
              <tr><td>6-18-502</td><td>6-18-503</td><td>Adopted 2019</td><td></td></tr>
            </table>
        </main></body></html>",
    )
    .await;
    mount_html(&server, "/page/102", 404, "").await;

    let result = extract_with(&test_fetcher(), &request(&format!("{}/policies", server.uri())))
        .await
        .expect("one row should be extracted");

    assert_eq!(result.platform, Platform::TableLink);
    assert_eq!(result.discovered_count, 2);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.failed_items.len(), 1);
    assert_eq!(
        result.discovered_count,
        result.rows.len() + result.failed_items.len()
    );
    assert!(result.failed_items[0].reason.contains("404"));

    let row = &result.rows[0];
    assert_eq!(row.code, "1.01");
    assert_eq!(row.title, "Dress Code");
    assert_eq!(row.section, "1");
    assert!(row.wording.contains("Students shall dress appropriately"));
    let PolicyMetadata::TableLink {
        statutory_authority,
        history,
        ..
    } = &row.metadata
    else {
        panic!("expected table-link metadata");
    };
    assert_eq!(statutory_authority, "6-18-502");
    assert_eq!(history, "Adopted 2019");

    let csv = result.to_csv();
    assert!(csv.contains("1,1.01,Dress Code,6-18-502"));
    server.verify().await;
}

#[tokio::test]
async fn test_listing_header_without_rows_is_fatal() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_html(
        &server,
        "/policies",
        200,
        "<table><tr><th>Name of Policy</th><th>Date</th></tr></table>",
    )
    .await;

    let err = extract_with(&test_fetcher(), &request(&format!("{}/policies", server.uri())))
        .await
        .expect_err("no references must be fatal");

    assert!(matches!(err, ExtractError::NoReferences { .. }), "got {err:?}");
    assert!(err.to_string().contains("no policy links found"));
}

#[tokio::test]
async fn test_blank_listing_is_undetermined() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_html(&server, "/policies", 200, "   ").await;

    let err = extract_with(&test_fetcher(), &request(&format!("{}/policies", server.uri())))
        .await
        .expect_err("blank listing must fail");

    assert!(matches!(err, ExtractError::UndeterminedPlatform { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_boarddocs_selects_policy_manual_and_records_failures() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let base = "/ar/district/Board.nsf";

    Mock::given(method("GET"))
        .and(path(format!("{base}/BD-GetPolicyBooks")))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"["Policy Manual", "Bylaws"]"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{base}/BD-GetPolicies")))
        .and(query_param("book", "Policy Manual"))
        .and(query_param("filter", "active"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r##"<div><h3>Section 1000 Community</h3>
                <a href="#" unique="ABC123">1000 Mission</a>
                <a href="#" unique="DEF456">1010 Goals</a></div>"##,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{base}/BD-GetPolicies")))
        .and(query_param("book", "Bylaws"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{base}/BD-GetPolicies")))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{base}/BD-GetPolicyItem")))
        .and(query_param("id", "ABC123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <table><tr><td>Title</td><td>Mission</td></tr>
                       <tr><td>Adopted</td><td>01/02/2003</td></tr></table>
                <div id="policy-content"><p>We teach every student.</p></div>
            </body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{base}/BD-GetPolicyItem")))
        .and(query_param("id", "DEF456"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let listing = format!("{}{base}/Public", server.uri());
    let result = extract_with(&test_fetcher(), &request(&listing))
        .await
        .expect("one item should be extracted");

    assert_eq!(result.platform, Platform::BoardDocs);
    assert_eq!(result.discovered_count, 2);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.failed_items.len(), 1);
    assert!(result.failed_items[0].reason.contains("500"));

    let row = &result.rows[0];
    assert_eq!(row.code, "1000");
    assert_eq!(row.title, "Mission");
    assert_eq!(row.section, "Section 1000 Community");
    assert_eq!(row.status, "Active");
    assert_eq!(row.adopted_date, "01/02/2003");
    assert_eq!(row.wording, "We teach every student.");
    assert!(row.source_url.ends_with("Board.nsf/goto?open&id=ABC123"));
    assert!(matches!(
        &row.metadata,
        PolicyMetadata::BoardDocs { book, item_id } if book == "Policy Manual" && item_id == "ABC123"
    ));
    server.verify().await;
}

#[tokio::test]
async fn test_accordion_listing_with_unreadable_pdfs_fails_with_counts() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_html(
        &server,
        "/board/policies",
        200,
        r#"<div class="accordion">
             <h3 class="accordion-header"><button aria-expanded="false">Series 2000 - Instruction</button></h3>
             <div class="accordion-body">
               <a href="/docs/2.10-attendance.pdf">2.10 Attendance</a>
               <a href="/docs/2.20-grading.pdf">2.20 Grading</a>
             </div>
           </div>"#,
    )
    .await;
    mount_html(&server, "/docs/2.10-attendance.pdf", 200, "<html>Scan in progress</html>").await;
    mount_html(&server, "/docs/2.20-grading.pdf", 404, "").await;

    let err = extract_with(
        &test_fetcher(),
        &request(&format!("{}/board/policies", server.uri())),
    )
    .await
    .expect_err("no PDF can be read");

    let ExtractError::NoRowsExtracted {
        discovered,
        first_reason,
    } = &err
    else {
        panic!("expected NoRowsExtracted, got {err:?}");
    };
    assert_eq!(*discovered, 2);
    assert!(first_reason.contains("not a PDF"), "first reason: {first_reason}");
}

#[tokio::test]
async fn test_accordion_listing_turns_pdf_into_row() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_html(
        &server,
        "/board/policies",
        200,
        r#"<div class="accordion">
             <h3 class="accordion-header"><button aria-expanded="true">Series 2000 - Instruction</button></h3>
             <div class="accordion-body">
               <a href="/docs/2.10-attendance.pdf">2.10 Attendance</a>
               <a href="/docs/2.20-grading.pdf">2.20 Grading</a>
             </div>
           </div>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/docs/2.10-attendance.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(include_bytes!("fixtures/attendance-policy.pdf").to_vec()),
        )
        .mount(&server)
        .await;
    mount_html(&server, "/docs/2.20-grading.pdf", 404, "").await;

    let result = extract_with(
        &test_fetcher(),
        &request(&format!("{}/board/policies", server.uri())),
    )
    .await
    .expect("the readable PDF should produce a row");

    assert_eq!(result.platform, Platform::AccordionPdf);
    assert_eq!(result.discovered_count, 2);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.failed_items.len(), 1);

    let row = &result.rows[0];
    assert_eq!(row.code, "2.10");
    assert_eq!(row.title, "Attendance");
    assert_eq!(row.adopted_date, "1/1/2020");
    assert_eq!(row.section, "Instruction");
    assert!(row.source_url.ends_with("/docs/2.10-attendance.pdf"));
    assert!(row.wording.contains("Students shall attend school every day."));
    assert!(!row.wording.contains("ADOPTED"));
    assert!(!row.wording.contains("BOARD POLICY"));
}

#[tokio::test]
async fn test_fixed_platform_hint_skips_detection() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    // Detection would pick the accordion; the hint forces the table parser.
    mount_html(
        &server,
        "/policies",
        200,
        r#"<details><summary>Series 1</summary><a href="/p/1.01.pdf">1.01 Mission</a></details>"#,
    )
    .await;

    let options = ExtractOptions {
        platform: PlatformHint::Fixed(Platform::TableLink),
        ..ExtractOptions::default()
    };
    let request = ExtractRequest::new(&format!("{}/policies", server.uri()), options)
        .expect("valid request");
    let err = extract_with(&test_fetcher(), &request)
        .await
        .expect_err("no listing table");

    assert!(matches!(err, ExtractError::NoReferences { .. }), "got {err:?}");
}
