use super::*;

#[test]
fn test_defaults() {
    let page = PageParams::default().resolve().unwrap();
    assert_eq!(page, Page { size: 100, page: 0 });
}

#[test]
fn test_max_results_bounds() {
    let too_small = PageParams {
        max_results: Some(4),
        next_token: None,
    };
    assert!(too_small.resolve().is_err());

    let too_large = PageParams {
        max_results: Some(1001),
        next_token: None,
    };
    assert!(too_large.resolve().is_err());

    let ok = PageParams {
        max_results: Some(5),
        next_token: None,
    };
    assert_eq!(ok.resolve().unwrap().size, 5);
}

#[test]
fn test_next_token_is_page_index() {
    let params = PageParams {
        max_results: Some(10),
        next_token: Some("3".to_string()),
    };
    assert_eq!(params.resolve().unwrap(), Page { size: 10, page: 3 });

    let bad = PageParams {
        max_results: None,
        next_token: Some("abc".to_string()),
    };
    assert!(bad.resolve().is_err());
}

#[test]
fn test_apply_slices_and_links_pages() {
    let items: Vec<u32> = (0..12).collect();

    let (first, next) = Page { size: 5, page: 0 }.apply(&items);
    assert_eq!(first, vec![0, 1, 2, 3, 4]);
    assert_eq!(next.as_deref(), Some("1"));

    let (last, next) = Page { size: 5, page: 2 }.apply(&items);
    assert_eq!(last, vec![10, 11]);
    assert!(next.is_none());

    let (empty, next) = Page { size: 5, page: 9 }.apply(&items);
    assert!(empty.is_empty());
    assert!(next.is_none());
}
