//! Catalog journeys run end to end against a scripted MovieVerse site.

use async_trait::async_trait;
use movieverse_harness::{
    movieverse, BrowserDriver, DeviceDescriptor, DriverConfig, DriverError, DriverFactory,
    DriverResult, FailureKind, HarnessConfig, ManualClock, MockDriver, MockElement, MockPage,
    MockReaction, NetworkEvent, RunReport, Scenario, ScenarioRunner, ScenarioStatus, UrlPattern,
    WaitPolicy,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HOME: &str = "http://localhost:5173/";
const PLAYER: &str = r#"iframe[src*="youtube"]"#;

/// Knobs for the scripted site
#[derive(Clone, Copy, Default)]
struct Site {
    no_trailer: bool,
    no_title: bool,
    min_width: u32,
    keyless_request: bool,
}

impl Site {
    fn pages(self) -> Vec<MockPage> {
        let mut home = MockPage::new(UrlPattern::Exact(HOME.into()))
            .title("MovieVerse")
            .min_width(self.min_width)
            .element(MockElement::new("span").text("MovIA").navigates_to(HOME))
            .element(
                MockElement::new("input")
                    .selector(r#"input[placeholder*="Buscar"]"#)
                    .on_enter(MockReaction::NavigateWithValue(
                        "http://localhost:5173/search?q={value}".into(),
                    )),
            )
            .element(
                MockElement::new("a")
                    .text("Tendencias")
                    .navigates_to("http://localhost:5173/trending"),
            )
            .element(MockElement::new("img").navigates_to("http://localhost:5173/movie/550"))
            .element(MockElement::new("p").text("Peter Parker asks Doctor Strange for help."))
            .element(MockElement::new("button").text("Más información"))
            .element(MockElement::new("button").text("Ver tráiler"))
            .element(MockElement::new("div").selector(".flex.gap-4"))
            .request("https://api.themoviedb.org/3/trending/movie/week?api_key=k")
            .request("https://api.themoviedb.org/3/movie/top_rated?api_key=k")
            .request("https://api.themoviedb.org/3/movie/upcoming?api_key=k")
            .request("https://image.tmdb.org/t/p/w500/poster.jpg");
        if !self.no_title {
            home = home.element(MockElement::new("h1").text("Spider-Man: No Way Home"));
        }
        if self.keyless_request {
            home = home.request("https://api.themoviedb.org/3/genre/movie/list");
        } else {
            home = home.request("https://api.themoviedb.org/3/genre/movie/list?api_key=k");
        }

        let mut detail = MockPage::new(UrlPattern::Regex(r"/movie/\d+".into()))
            .title("Fight Club | MovieVerse")
            .element(MockElement::new("span").text("MovIA").navigates_to(HOME))
            .element(MockElement::new("h1").text("Fight Club"))
            .element(MockElement::new("img"))
            .element(MockElement::new("p").text("An insomniac office worker..."));
        if !self.no_trailer {
            detail = detail
                .element(
                    MockElement::new("button")
                        .text("Ver tráiler")
                        .on_click(MockReaction::Show(PLAYER.into())),
                )
                .element(
                    MockElement::new("iframe")
                        .selector(PLAYER)
                        .hidden()
                        .on_key("Escape", MockReaction::Hide(PLAYER.into())),
                );
        }

        vec![
            home,
            detail,
            MockPage::new(UrlPattern::contains("/trending"))
                .element(MockElement::new("span").text("MovIA").navigates_to(HOME))
                .element(MockElement::new("h1").text("Tendencias"))
                .element(MockElement::new("img")),
            MockPage::new(UrlPattern::contains(&movieverse::NONSENSE_QUERY[..8]))
                .element(MockElement::new("p").text("No se encontraron resultados")),
            MockPage::new(UrlPattern::contains("/search"))
                .element(MockElement::new("img").selector("img[alt*='poster']"))
                .element(MockElement::new("img")),
        ]
    }

    fn driver(self, clock: &ManualClock) -> MockDriver {
        self.pages()
            .into_iter()
            .fold(MockDriver::new().with_clock(Arc::new(clock.clone())), MockDriver::page)
    }
}

struct Harness {
    runner: ScenarioRunner,
    clock: ManualClock,
    temp: tempfile::TempDir,
}

fn harness() -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let config = HarnessConfig::default()
        .with_artifact_dir(temp.path().join("screenshots"))
        .with_wait(WaitPolicy::from_millis(5_000, 100));
    let runner = ScenarioRunner::new(config).with_clock(Arc::new(clock.clone()));
    Harness {
        runner,
        clock,
        temp,
    }
}

struct SiteFactory {
    site: Site,
    clock: ManualClock,
    opened: AtomicUsize,
}

#[async_trait]
impl DriverFactory for SiteFactory {
    type Driver = MockDriver;

    async fn open(&self, _config: &DriverConfig) -> DriverResult<MockDriver> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.site.driver(&self.clock))
    }
}

mod basic_tests {
    use super::*;

    #[tokio::test]
    async fn test_homepage_logo() {
        let h = harness();
        let driver = Site::default().driver(&h.clock);
        let report = h.runner.run(driver.clone(), &movieverse::homepage_loads()).await;
        assert_eq!(report.status, ScenarioStatus::Completed);
        assert_eq!(report.steps.len(), 1);
        assert!(report.all_passed());
        let artifacts = report.artifacts();
        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].exists());
        assert!(driver.is_closed());
    }

    #[tokio::test]
    async fn test_trending_and_back_home() {
        let h = harness();
        let driver = Site::default().driver(&h.clock);
        let report = h
            .runner
            .run(driver.clone(), &movieverse::trending_navigation())
            .await;
        assert!(report.all_passed(), "{}", report.summary());
        assert_eq!(driver.history().iter().filter(|c| c.starts_with("click")).count(), 2);
    }
}

mod quick_tests {
    use super::*;

    #[tokio::test]
    async fn test_quick_journeys_pass() {
        for scenario in movieverse::tagged("quick") {
            let h = harness();
            let report = h.runner.run(Site::default().driver(&h.clock), &scenario).await;
            assert!(report.all_passed(), "{}: {}", scenario.name, report.summary());
        }
    }

    #[tokio::test]
    async fn test_trending_url_lands_on_trending() {
        let h = harness();
        let driver = Site::default().driver(&h.clock);
        let report = h.runner.run(driver.clone(), &movieverse::trending_url()).await;
        assert!(report.all_passed(), "{}", report.summary());
        let url = driver.current_url().await.unwrap();
        assert!(url.ends_with("/trending"), "{url}");
    }

    #[tokio::test]
    async fn test_missing_title_is_soft() {
        let h = harness();
        let site = Site {
            no_title: true,
            ..Site::default()
        };
        let scenario = movieverse::missing_element_tolerated();
        let report = h.runner.run(site.driver(&h.clock), &scenario).await;
        assert_eq!(report.status, ScenarioStatus::Completed);
        assert!(report.steps[0].status.is_passed());
        assert_eq!(report.steps[1].failure, Some(FailureKind::NotFound));
        assert!(report.steps[2].status.is_passed());
    }
}

mod search_tests {
    use super::*;

    #[tokio::test]
    async fn test_search_with_results() {
        let h = harness();
        let driver = Site::default().driver(&h.clock);
        let report = h.runner.run(driver.clone(), &movieverse::search_success()).await;
        assert_eq!(report.steps.len(), 5);
        assert_eq!(report.passed_count(), 5, "{}", report.summary());
        let url = driver.current_url().await.unwrap();
        assert!(url.ends_with("/search?q=Spider"), "{url}");
    }

    #[tokio::test]
    async fn test_zero_results_is_soft() {
        let h = harness();
        let driver = Site::default().driver(&h.clock);
        let scenario = movieverse::search(movieverse::NONSENSE_QUERY);
        let report = h.runner.run(driver, &scenario).await;
        assert_eq!(report.status, ScenarioStatus::Completed);
        assert_eq!(report.skipped_count(), 0);
        assert_eq!(report.failed_count(), 1);
        assert!(report.steps[4].status.is_failed());
        assert!(report.steps[4].artifact_path.is_some());
    }

    #[tokio::test]
    async fn test_empty_state_journey() {
        let h = harness();
        let driver = Site::default().driver(&h.clock);
        let report = h.runner.run(driver, &movieverse::search_empty()).await;
        assert!(report.all_passed(), "{}", report.summary());
    }
}

mod detail_tests {
    use super::*;

    #[tokio::test]
    async fn test_trailer_opens_and_closes() {
        let h = harness();
        let driver = Site::default().driver(&h.clock);
        let report = h.runner.run(driver, &movieverse::trailer_modal()).await;
        assert!(report.all_passed(), "{}", report.summary());
        assert_eq!(report.artifacts().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_trailer_aborts_with_full_report() {
        let h = harness();
        let site = Site {
            no_trailer: true,
            ..Site::default()
        };
        let scenario = movieverse::trailer_modal();
        let report = h.runner.run(site.driver(&h.clock), &scenario).await;
        assert_eq!(report.status, ScenarioStatus::Aborted);
        assert_eq!(report.steps.len(), scenario.steps.len());
        assert_eq!(report.executed(), 4);
        assert_eq!(report.steps[3].failure, Some(FailureKind::NotFound));
        assert!(report.steps[4..].iter().all(|s| s.status.is_skipped()));
        assert!(report.is_complete());
    }
}

mod deadline_tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_cut_by_deadline() {
        let h = harness();
        let site = Site {
            no_title: true,
            ..Site::default()
        };
        let scenario = movieverse::hero_section().with_deadline(Duration::from_secs(1));
        let report = h.runner.run(site.driver(&h.clock), &scenario).await;
        assert_eq!(report.status, ScenarioStatus::Aborted);
        assert_eq!(report.steps[0].failure, Some(FailureKind::DeadlineExceeded));
        assert_eq!(report.executed(), 1);
        assert_eq!(report.steps.len(), 6);
        assert_eq!(h.clock.now_ms(), 1_000);
    }
}

mod fault_tests {
    use super::*;

    #[tokio::test]
    async fn test_disconnect_leaves_report_incomplete() {
        let h = harness();
        let driver = Site::default().driver(&h.clock);
        let error = DriverError::Disconnected {
            message: "websocket closed".into(),
        };
        driver.fail_next("click", error.clone());
        let report = h
            .runner
            .run(driver.clone(), &movieverse::trending_navigation())
            .await;
        assert_eq!(report.steps[0].failure, Some(FailureKind::DriverError));
        assert_eq!(report.driver_error, Some(error));
        assert!(!report.is_complete());
        assert!(driver.is_closed());
    }
}

mod network_tests {
    use super::*;

    #[tokio::test]
    async fn test_api_errors_do_not_break_the_app() {
        let h = harness();
        let driver = Site::default().driver(&h.clock);
        let report = h
            .runner
            .run(driver.clone(), &movieverse::api_error_resilience())
            .await;
        assert!(report.all_passed(), "{}", report.summary());
        let log = driver.network_log().await.unwrap();
        let failed = log
            .iter()
            .filter(|e| matches!(e, NetworkEvent::Failed { .. }))
            .count();
        assert_eq!(failed, 2);
    }

    #[tokio::test]
    async fn test_tmdb_integration() {
        let h = harness();
        let report = h
            .runner
            .run(Site::default().driver(&h.clock), &movieverse::tmdb_integration())
            .await;
        assert!(report.all_passed(), "{}", report.summary());
    }

    #[tokio::test]
    async fn test_request_without_key_fails() {
        let h = harness();
        let site = Site {
            keyless_request: true,
            ..Site::default()
        };
        let report = h
            .runner
            .run(site.driver(&h.clock), &movieverse::tmdb_integration())
            .await;
        let step = report.step("api key sent").unwrap();
        assert!(step.status.is_failed());
        assert!(step.message.contains("genre/movie/list"), "{}", step.message);
        assert_eq!(report.status, ScenarioStatus::Aborted);
    }
}

mod device_tests {
    use super::*;

    #[tokio::test]
    async fn test_device_sweep_concurrent() {
        let h = harness();
        let factory = SiteFactory {
            site: Site::default(),
            clock: h.clock.clone(),
            opened: AtomicUsize::new(0),
        };
        let scenarios = movieverse::device_sweep();
        let run = h.runner.run_all(&factory, &scenarios).await;
        assert_eq!(factory.opened.load(Ordering::SeqCst), 3);
        assert!(run.all_passed(), "{}", run.summary());
        let names: Vec<_> = run.scenarios.iter().map(|r| r.scenario.clone()).collect();
        let expected: Vec<_> = scenarios.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_phone_overflow_is_hard_failure() {
        let h = harness();
        let site = Site {
            min_width: 800,
            ..Site::default()
        };
        let phone = h
            .runner
            .run(site.driver(&h.clock), &movieverse::on_device(DeviceDescriptor::IPHONE))
            .await;
        assert_eq!(phone.status, ScenarioStatus::Aborted);
        assert_eq!(phone.steps[4].failure, Some(FailureKind::AssertionFailed));

        let desktop = h
            .runner
            .run(site.driver(&h.clock), &movieverse::on_device(DeviceDescriptor::DESKTOP))
            .await;
        assert!(desktop.all_passed(), "{}", desktop.summary());
    }
}

mod report_tests {
    use super::*;

    #[tokio::test]
    async fn test_run_writes_reports() {
        let h = harness();
        let factory = SiteFactory {
            site: Site::default(),
            clock: h.clock.clone(),
            opened: AtomicUsize::new(0),
        };
        let scenarios = movieverse::tagged("basic");
        let run = h.runner.run_all(&factory, &scenarios).await;
        assert!(run.all_passed(), "{}", run.summary());
        let dir = h.temp.path().join("reports");
        let written = run.write_all(&dir).await.unwrap();
        assert_eq!(written.len(), 3);
        let json = std::fs::read_to_string(dir.join("report.json")).unwrap();
        let back = RunReport::from_json(&json).unwrap();
        assert_eq!(back.scenarios.len(), scenarios.len());
        let junit = std::fs::read_to_string(dir.join("junit.xml")).unwrap();
        assert!(junit.contains("homepage loads"));
    }

    #[tokio::test]
    async fn test_catalog_from_yaml_file() {
        let h = harness();
        let path = h.temp.path().join("journeys.yaml");
        let yaml = Scenario::list_to_yaml(&movieverse::all()).unwrap();
        std::fs::write(&path, yaml).unwrap();
        let loaded = Scenario::load_file(&path).unwrap();
        assert_eq!(loaded, movieverse::all());
        let report = h
            .runner
            .run(Site::default().driver(&h.clock), &loaded[0])
            .await;
        assert!(report.all_passed());
    }
}
