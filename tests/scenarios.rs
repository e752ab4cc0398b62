//! End-to-end fallback scenarios over a simulated page.
//!
//! Every test runs on a paused clock so probe timeouts and rescan delays
//! are deterministic.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use cdn_fallback::dom;
use cdn_fallback::ledger::{self, Concern, PENDING_FLAG_ATTR, PENDING_URL_ATTR};
use cdn_fallback::Availability;

mod common;
use common::{background_rule, fallback, options, page, reveal, settle, ScriptedLoader};

const CDN_LOGO: &str = "https://cdn.example/app/logo.png";
const FALLBACK_LOGO: &str = "https://app.example/app/logo.png";

#[tokio::test(start_paused = true)]
async fn test_isolated_image_failure_retried_from_fallback() {
    let mut doc = page();
    let body = doc.body();
    let img = doc.append_element(body, "img", &[("src", CDN_LOGO)]);

    let (fallback, reporter) = fallback(doc, ScriptedLoader::up());
    fallback.init(options());
    settle().await;
    assert_eq!(fallback.cdn_available(), Availability::Available);

    dom::lock(fallback.document()).dispatch_load_error(img);
    settle().await;

    let doc = dom::lock(fallback.document());
    assert_eq!(doc.attr(img, "src"), Some(FALLBACK_LOGO));
    assert!(doc.marks(img).unwrap().retry_armed());
    assert_eq!(reporter.events(), vec!["resource_fallback"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_script_and_stylesheet_get_replacements() {
    let mut doc = page();
    let head = doc.head();
    let css = doc.append_element(head, "link", &[("rel", "stylesheet"), ("href", "https://cdn.example/app/site.css")]);
    let js = doc.append_element(head, "script", &[("src", "https://cdn.example/app/app.js"), ("defer", "")]);

    let (fallback, _) = fallback(doc, ScriptedLoader::up());
    fallback.init(options());
    settle().await;

    {
        let mut doc = dom::lock(fallback.document());
        doc.dispatch_load_error(css);
        doc.dispatch_load_error(js);
    }
    settle().await;

    let doc = dom::lock(fallback.document());
    let head = doc.head();
    let added: Vec<_> = doc.children(head).iter().copied().filter(|n| *n != css && *n != js).collect();
    assert_eq!(added.len(), 2);
    assert_eq!(doc.attr(added[0], "href"), Some("https://app.example/app/site.css"));
    assert_eq!(doc.attr(added[1], "src"), Some("https://app.example/app/app.js"));
    assert_eq!(doc.attr(added[1], "defer"), Some(""));
}

#[tokio::test(start_paused = true)]
async fn test_fallback_failure_hides_image_once() {
    let mut doc = page();
    let body = doc.body();
    let img = doc.append_element(body, "img", &[("src", CDN_LOGO)]);

    let (fallback, reporter) = fallback(doc, ScriptedLoader::up());
    fallback.init(options());
    settle().await;

    dom::lock(fallback.document()).dispatch_load_error(img);
    settle().await;
    dom::lock(fallback.document()).dispatch_load_error(img);
    settle().await;
    dom::lock(fallback.document()).dispatch_load_error(img);
    settle().await;

    let doc = dom::lock(fallback.document());
    assert_eq!(doc.style_property(img, "display").as_deref(), Some("none"));
    assert_eq!(doc.attr(img, "src"), Some(FALLBACK_LOGO));
    assert_eq!(reporter.events(), vec!["resource_fallback", "fallback_failed"]);
}

#[tokio::test(start_paused = true)]
async fn test_bulk_pass_when_cdn_down() {
    let mut doc = page();
    let body = doc.body();
    doc.add_style_rule(background_rule(".hero", "url(https://cdn.example/app/hero.jpg)", false));
    let img = doc.append_element(body, "img", &[("src", CDN_LOGO)]);
    let local = doc.append_element(body, "img", &[("src", "/local.png")]);
    let banner = doc.append_element(
        body,
        "div",
        &[("style", "background-image: url('https://cdn.example/app/banner.png')")],
    );
    let hero = doc.append_element(body, "div", &[("class", "hero")]);

    let loader = ScriptedLoader::down();
    let (fallback, reporter) = fallback(doc, loader.clone());
    fallback.init(options());
    settle().await;

    assert_eq!(fallback.cdn_available(), Availability::Unavailable);
    assert_eq!(loader.calls(), 1);
    assert!(loader.urls()[0].starts_with("https://cdn.example/app/probe.gif?_="));

    let doc = dom::lock(fallback.document());
    assert_eq!(doc.attr(img, "src"), Some(FALLBACK_LOGO));
    assert_eq!(doc.attr(local, "src"), Some("/local.png"));
    assert_eq!(
        doc.style_property(banner, "background-image").as_deref(),
        Some(r#"url("https://app.example/app/banner.png")"#)
    );
    assert_eq!(
        doc.style_property(hero, "background-image").as_deref(),
        Some(r#"url("https://app.example/app/hero.jpg")"#)
    );
    // img, banner and hero each fall back, then the domain-wide event.
    assert_eq!(
        reporter.events(),
        vec!["resource_fallback", "resource_fallback", "resource_fallback", "cdn_unavailable"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_probe_timeout_decides_unavailable() {
    let mut doc = page();
    let body = doc.body();
    let img = doc.append_element(body, "img", &[("src", CDN_LOGO)]);

    let (fallback, _) = fallback(doc, ScriptedLoader::hanging());
    let start = Instant::now();
    fallback.init(options().test_timeout(3000));

    sleep(Duration::from_millis(2999)).await;
    assert_eq!(fallback.cdn_available(), Availability::Unknown);
    assert_eq!(dom::lock(fallback.document()).attr(img, "src"), Some(CDN_LOGO));

    sleep(Duration::from_millis(5)).await;
    assert_eq!(fallback.cdn_available(), Availability::Unavailable);
    assert!(start.elapsed() < Duration::from_millis(3010));
    assert_eq!(dom::lock(fallback.document()).attr(img, "src"), Some(FALLBACK_LOGO));
}

#[tokio::test(start_paused = true)]
async fn test_rescan_picks_up_late_stylesheet() {
    let mut doc = page();
    let body = doc.body();
    let late = doc.append_element(body, "div", &[("class", "late")]);

    let (fallback, _) = fallback(doc, ScriptedLoader::down());
    fallback.init(options());
    settle().await;
    assert_eq!(dom::lock(fallback.document()).style_property(late, "background-image"), None);

    dom::lock(fallback.document()).add_style_rule(background_rule(".late", "url(//cdn.example/app/late.png)", false));
    sleep(Duration::from_millis(1100)).await;

    assert_eq!(
        dom::lock(fallback.document()).style_property(late, "background-image").as_deref(),
        Some(r#"url("https://app.example/app/late.png")"#)
    );
}

#[tokio::test(start_paused = true)]
async fn test_inserted_content_rewritten_while_down() {
    let (fallback, reporter) = fallback(page(), ScriptedLoader::down());
    fallback.init(options());
    settle().await;
    assert_eq!(reporter.events(), vec!["cdn_unavailable"]);

    let (img, tile) = {
        let mut doc = dom::lock(fallback.document());
        let card = doc.create_element("div");
        let img = doc.append_element(card, "img", &[("src", CDN_LOGO)]);
        let tile = doc.append_element(
            card,
            "div",
            &[("style", "background-image: url(https://cdn.example/app/tile.png)")],
        );
        let body = doc.body();
        doc.append_child(body, card);
        (img, tile)
    };

    settle().await;
    assert_eq!(dom::lock(fallback.document()).attr(img, "src"), Some(FALLBACK_LOGO));
    assert_eq!(reporter.events(), vec!["cdn_unavailable", "resource_fallback"]);
    // Backgrounds wait for the settle delay.
    assert_eq!(
        dom::lock(fallback.document()).style_property(tile, "background-image").as_deref(),
        Some("url(https://cdn.example/app/tile.png)")
    );

    sleep(Duration::from_millis(150)).await;
    assert_eq!(
        dom::lock(fallback.document()).style_property(tile, "background-image").as_deref(),
        Some(r#"url("https://app.example/app/tile.png")"#)
    );
    assert_eq!(
        reporter.events(),
        vec!["cdn_unavailable", "resource_fallback", "resource_fallback"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_insertions_while_unknown_left_to_bulk_pass() {
    let (fallback, reporter) = fallback(page(), ScriptedLoader::hanging());
    fallback.init(options().test_timeout(3000));
    settle().await;
    assert_eq!(fallback.cdn_available(), Availability::Unknown);

    let img = {
        let mut doc = dom::lock(fallback.document());
        let body = doc.body();
        doc.append_element(body, "img", &[("src", CDN_LOGO)])
    };

    // Watcher sees the insertion but the probe is still undecided.
    sleep(Duration::from_millis(2990)).await;
    assert_eq!(fallback.cdn_available(), Availability::Unknown);
    {
        let doc = dom::lock(fallback.document());
        assert_eq!(doc.attr(img, "src"), Some(CDN_LOGO));
        assert!(!ledger::is_marked(&doc, img, Concern::ErrorHandled));
    }
    assert!(reporter.events().is_empty());

    sleep(Duration::from_millis(10)).await;
    assert_eq!(fallback.cdn_available(), Availability::Unavailable);
    let doc = dom::lock(fallback.document());
    assert_eq!(doc.attr(img, "src"), Some(FALLBACK_LOGO));
    assert!(ledger::is_marked(&doc, img, Concern::ErrorHandled));
    // One fallback for the image, from the bulk pass only.
    assert_eq!(reporter.events(), vec!["resource_fallback", "cdn_unavailable"]);
}

#[tokio::test(start_paused = true)]
async fn test_inserted_content_untouched_while_available() {
    let (fallback, _) = fallback(page(), ScriptedLoader::up());
    fallback.init(options());
    settle().await;

    let img = {
        let mut doc = dom::lock(fallback.document());
        let body = doc.body();
        doc.append_element(body, "img", &[("src", CDN_LOGO)])
    };
    sleep(Duration::from_millis(1500)).await;

    let doc = dom::lock(fallback.document());
    assert_eq!(doc.attr(img, "src"), Some(CDN_LOGO));
    assert!(!ledger::is_marked(&doc, img, Concern::ErrorHandled));
}

#[tokio::test(start_paused = true)]
async fn test_deferred_elements_handed_to_reveal() {
    let mut doc = page();
    let body = doc.body();
    doc.add_style_rule(background_rule(".hero", "url(https://cdn.example/app/hero.jpg)", false));
    doc.add_style_rule(background_rule(".lazy-bg", "none", true));
    let hero = doc.append_element(body, "section", &[("class", "lazy-bg hero")]);
    let promo = doc.append_element(body, "section", &[("class", "lazy-bg promo")]);

    let (fallback, _) = fallback(doc, ScriptedLoader::down());
    fallback.init(options());
    settle().await;

    {
        let doc = dom::lock(fallback.document());
        assert_eq!(doc.attr(hero, PENDING_FLAG_ATTR), Some("true"));
        assert_eq!(doc.attr(hero, PENDING_URL_ATTR), Some("https://app.example/app/hero.jpg"));
        assert_eq!(doc.attr(promo, PENDING_FLAG_ATTR), Some("true"));
        assert_eq!(doc.attr(promo, PENDING_URL_ATTR), None);
    }

    // The promo image only becomes resolvable after the bulk pass.
    dom::lock(fallback.document()).add_style_rule(background_rule(".promo", "url(https://cdn.example/app/promo.jpg)", false));

    reveal(&fallback, hero);
    reveal(&fallback, promo);

    let doc = dom::lock(fallback.document());
    assert_eq!(
        doc.style_property(hero, "background-image").as_deref(),
        Some(r#"url("https://app.example/app/hero.jpg")"#)
    );
    assert_eq!(doc.attr(hero, PENDING_URL_ATTR), None);
    assert_eq!(
        doc.style_property(promo, "background-image").as_deref(),
        Some(r#"url("https://app.example/app/promo.jpg")"#)
    );
}

#[tokio::test(start_paused = true)]
async fn test_check_element_by_selector() {
    let mut doc = page();
    let body = doc.body();
    let modal = doc.append_element(body, "div", &[("id", "modal")]);
    let inner = doc.append_element(
        modal,
        "div",
        &[("style", "background-image: url(https://cdn.example/app/modal.png)")],
    );

    let (fallback, _) = fallback(doc, ScriptedLoader::up());
    fallback.init(options());
    settle().await;

    assert_eq!(fallback.check_element("##"), 0);
    assert_eq!(fallback.check_element("#missing"), 0);
    assert_eq!(fallback.check_element("#modal"), 1);
    assert_eq!(fallback.check_element(modal), 0);
    assert_eq!(
        dom::lock(fallback.document()).style_property(inner, "background-image").as_deref(),
        Some(r#"url("https://app.example/app/modal.png")"#)
    );
}

#[tokio::test(start_paused = true)]
async fn test_reinit_resets_probe() {
    let loader = ScriptedLoader::down();
    let (fallback, _) = fallback(page(), loader.clone());
    fallback.init(options());
    settle().await;
    assert_eq!(fallback.cdn_available(), Availability::Unavailable);

    loader.set_up(true);
    fallback.init(options().fallback_domain("https://mirror.example"));
    assert_eq!(fallback.cdn_available(), Availability::Unknown);
    assert_eq!(fallback.config().unwrap().fallback_origin, "https://mirror.example");

    settle().await;
    assert_eq!(fallback.cdn_available(), Availability::Available);
    assert_eq!(loader.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_without_probe_path_cdn_assumed_available() {
    let loader = ScriptedLoader::down();
    let (fallback, _) = fallback(page(), loader.clone());
    fallback.init(cdn_fallback::FallbackOptions::new("cdn.example/app"));
    settle().await;

    assert_eq!(fallback.cdn_available(), Availability::Available);
    assert_eq!(loader.calls(), 0);
    assert_eq!(fallback.check_element("body"), 0);
}
