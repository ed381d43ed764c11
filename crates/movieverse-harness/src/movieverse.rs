//! MovieVerse user journeys.
//!
//! Each function builds one [`Scenario`] against the app's conventional
//! landmarks: the `MovIA` logo, `h1` titles, poster `img`s, the
//! `input[placeholder*="Buscar"]` search box and the Spanish navigation
//! labels. Tags group journeys by level (`basic`, `intermediate`,
//! `advanced`, `project`); the one-check warm-ups are also tagged `quick`.
//!
//! Fixed sleeps are expressed as condition waits wherever the signal is
//! observable; the few remaining ones use [`Condition::Elapsed`].

use crate::assertion::{Matcher, RequestExpectation, TextPattern};
use crate::driver::DeviceDescriptor;
use crate::locator::LocatorSpec;
use crate::network::{AbortReason, RoutePolicy, UrlPattern};
use crate::scenario::{Action, FailurePolicy, Scenario, Step, Target};
use crate::wait::{Condition, CountPredicate, WaitPolicy};
use std::time::Duration;

/// Logo text
pub const LOGO_TEXT: &str = "MovIA";
/// Navigation label of the trending section
pub const TRENDING_LABEL: &str = "Tendencias";
/// Hero call-to-action labels
pub const MORE_INFO_LABEL: &str = "Más información";
/// Trailer button label
pub const TRAILER_LABEL: &str = "Ver tráiler";
/// Requests to the TMDB API
pub const TMDB_API_GLOB: &str = "**/api.themoviedb.org/**";
/// Query with no results
pub const NONSENSE_QUERY: &str = "asdfghjklqwertyuiop123456789";

/// Navigation sections: label, URL fragment
pub const SECTIONS: [(&str, &str); 4] = [
    ("Tendencias", "trending"),
    ("Mejor Valoradas", "top-rated"),
    ("Próximos Estrenos", "upcoming"),
    ("En Cines", "now-playing"),
];

// ============================================================================
// LANDMARKS
// ============================================================================

/// The logo (first match)
#[must_use]
pub fn logo() -> LocatorSpec {
    LocatorSpec::text(LOGO_TEXT).first()
}

/// The search field
#[must_use]
pub fn search_input() -> LocatorSpec {
    LocatorSpec::css(r#"input[placeholder*="Buscar"]"#).or_css(r#"input[type="search"]"#)
}

/// Movie posters
#[must_use]
pub fn posters() -> LocatorSpec {
    LocatorSpec::css("img")
}

/// First poster
#[must_use]
pub fn first_poster() -> LocatorSpec {
    posters().first()
}

/// Main title
#[must_use]
pub fn title() -> LocatorSpec {
    LocatorSpec::css("h1").first()
}

/// Trailer button on hero and detail pages
#[must_use]
pub fn trailer_button() -> LocatorSpec {
    LocatorSpec::text(TRAILER_LABEL)
        .or_text("Trailer")
        .or_css(r#"button[title*="trailer"]"#)
        .first()
}

/// Trailer player inside the modal
#[must_use]
pub fn trailer_player() -> LocatorSpec {
    LocatorSpec::css(r#"iframe[src*="youtube"]"#)
        .or_css("video")
        .or_css(".modal")
}

fn at(spec: LocatorSpec) -> Target {
    Target::Locator(spec)
}

fn movie_detail_url() -> UrlPattern {
    UrlPattern::Regex(r"/movie/\d+".to_string())
}

fn home_url() -> UrlPattern {
    UrlPattern::Regex(r"^https?://[^/]+/?$".to_string())
}

/// Settle time for content that has no observable signal
fn settle(ms: u64) -> Step {
    Step::wait(
        format!("settle {ms}ms"),
        Condition::Elapsed(Duration::from_millis(ms)),
    )
    .with_policy(WaitPolicy::from_millis(ms, 100))
}

fn open_first_movie(steps: &mut Vec<Step>) {
    steps.push(Step::wait("posters loaded", Condition::Visible(first_poster())));
    steps.push(Step::click("open first movie", at(first_poster())));
    steps.push(Step::wait("detail url", Condition::UrlMatches(movie_detail_url())));
}

fn scenario_with(name: &str, tag: &str, steps: Vec<Step>) -> Scenario {
    steps
        .into_iter()
        .fold(Scenario::new(name).tag(tag), Scenario::step)
}

// ============================================================================
// BASIC
// ============================================================================

/// Homepage loads and shows the logo
#[must_use]
pub fn homepage_loads() -> Scenario {
    Scenario::new("homepage loads")
        .tag("basic")
        .entry("/")
        .step(Step::assert("logo visible", at(logo()), Matcher::IsVisible).captured())
}

/// Hero section shows a movie with its call-to-action buttons
#[must_use]
pub fn hero_section() -> Scenario {
    scenario_with(
        "hero section",
        "basic",
        vec![
            Step::wait("hero title", Condition::Visible(title())),
            Step::assert(
                "title not empty",
                at(title()),
                Matcher::HasText(TextPattern::NonEmpty),
            ),
            Step::assert("overview visible", at(LocatorSpec::css("p").first()), Matcher::IsVisible),
            Step::assert(
                "more info button",
                at(LocatorSpec::text(MORE_INFO_LABEL)),
                Matcher::IsVisible,
            ),
            Step::assert("trailer button", at(trailer_button()), Matcher::IsVisible),
            Step::capture("screenshot", "hero section loaded"),
        ],
    )
    .entry("/")
}

/// Trending link navigates, shows posters, logo leads back home
#[must_use]
pub fn trending_navigation() -> Scenario {
    scenario_with(
        "trending navigation",
        "basic",
        vec![
            Step::click("open trending", at(LocatorSpec::text(TRENDING_LABEL).first())),
            Step::wait(
                "trending url",
                Condition::UrlMatches(UrlPattern::contains("trending")),
            ),
            Step::wait("network idle", Condition::NetworkIdle),
            Step::assert("posters visible", at(first_poster()), Matcher::IsVisible),
            Step::capture("screenshot", "trending page"),
            Step::click("back via logo", at(logo())),
            Step::wait("home url", Condition::UrlMatches(home_url())),
        ],
    )
    .entry("/")
}

/// A movie carousel scrolls horizontally
#[must_use]
pub fn carousel_scroll() -> Scenario {
    scenario_with(
        "carousel scroll",
        "basic",
        vec![
            Step::resolve(
                "find carousel",
                "carousel",
                LocatorSpec::css(".flex.gap-4").first(),
            ),
            Step::assert(
                "carousel visible",
                Target::Binding("carousel".into()),
                Matcher::IsVisible,
            ),
            Step::act(
                "scroll right",
                Target::Binding("carousel".into()),
                Action::Scroll { dx: 300, dy: 0 },
            ),
            settle(1_000),
            Step::capture("screenshot", "carousel scrolled"),
        ],
    )
    .entry("/")
}

// ============================================================================
// QUICK
// ============================================================================

fn quick(name: &str, steps: Vec<Step>) -> Scenario {
    scenario_with(name, "basic", steps).tag("quick").entry("/")
}

/// Open the homepage and keep a screenshot
#[must_use]
pub fn first_look() -> Scenario {
    quick(
        "first look",
        vec![Step::capture("screenshot", "homepage opened")],
    )
}

/// Posters show up once content has loaded
#[must_use]
pub fn posters_loaded() -> Scenario {
    quick(
        "posters loaded",
        vec![
            Step::wait(
                "posters rendered",
                Condition::Count {
                    locator: posters(),
                    predicate: CountPredicate::AtLeast(1),
                },
            ),
            Step::assert("at least one poster", at(posters()), Matcher::CountAtLeast(1)),
            Step::capture("screenshot", "posters loaded"),
        ],
    )
}

/// Trending link lands on a trending URL
#[must_use]
pub fn trending_url() -> Scenario {
    quick(
        "trending url",
        vec![
            Step::click("open trending", at(LocatorSpec::text(TRENDING_LABEL).first())),
            Step::wait("network idle", Condition::NetworkIdle),
            Step::assert(
                "url mentions trending",
                Target::Page,
                Matcher::UrlMatches(UrlPattern::contains("trending")),
            ),
            Step::capture("screenshot", "trending url"),
        ],
    )
}

/// The logo is found through text or its class, whichever matches first
#[must_use]
pub fn logo_fallbacks() -> Scenario {
    quick(
        "logo fallbacks",
        vec![Step::assert(
            "logo by text or class",
            at(LocatorSpec::text(LOGO_TEXT).or_css(".logo").first()),
            Matcher::IsVisible,
        )],
    )
}

/// A missing element is tolerated; the page title is still read
#[must_use]
pub fn missing_element_tolerated() -> Scenario {
    quick(
        "missing element tolerated",
        vec![
            Step::assert(
                "absent button stays hidden",
                at(LocatorSpec::text("Botón Que No Existe")),
                Matcher::IsHidden,
            ),
            Step::assert(
                "title has text",
                at(title()),
                Matcher::HasText(TextPattern::NonEmpty),
            )
            .soft(),
            Step::capture("screenshot", "missing element"),
        ],
    )
}

/// Title, posters and trending in one short pass
#[must_use]
pub fn quick_flow() -> Scenario {
    quick(
        "quick flow",
        vec![
            Step::wait("title visible", Condition::Visible(title())),
            Step::assert(
                "title has text",
                at(title()),
                Matcher::HasText(TextPattern::NonEmpty),
            ),
            Step::assert("posters present", at(posters()), Matcher::CountAtLeast(1)),
            Step::click("open trending", at(LocatorSpec::text(TRENDING_LABEL).first())),
            Step::wait("network idle", Condition::NetworkIdle),
            Step::capture("screenshot", "quick flow complete"),
        ],
    )
}

// ============================================================================
// INTERMEDIATE
// ============================================================================

/// Search for `query`; the result count check is soft
#[must_use]
pub fn search(query: &str) -> Scenario {
    Scenario::new(format!("search {query}"))
        .tag("intermediate")
        .tag("search")
        .entry("/")
        .step(Step::resolve("search box", "search", search_input()))
        .step(Step::act(
            "type query",
            Target::Binding("search".into()),
            Action::Fill(query.to_string()),
        ))
        .step(Step::act(
            "submit",
            Target::Binding("search".into()),
            Action::Press("Enter".into()),
        ))
        .step(Step::wait(
            "results url",
            Condition::UrlMatches(UrlPattern::contains("search")),
        ))
        .step(
            Step::assert("results shown", at(posters()), Matcher::CountAtLeast(1))
                .soft()
                .captured(),
        )
}

/// Search that returns results
#[must_use]
pub fn search_success() -> Scenario {
    search("Spider")
}

/// Search with no results shows an empty state instead of posters
#[must_use]
pub fn search_empty() -> Scenario {
    scenario_with(
        "search without results",
        "intermediate",
        vec![
            Step::resolve("search box", "search", search_input()),
            Step::act(
                "type nonsense",
                Target::Binding("search".into()),
                Action::Fill(NONSENSE_QUERY.into()),
            ),
            Step::act(
                "submit",
                Target::Binding("search".into()),
                Action::Press("Enter".into()),
            ),
            Step::wait("network idle", Condition::NetworkIdle),
            Step::assert(
                "empty state message",
                at(LocatorSpec::text("No se encontraron")
                    .or_text("No hay resultados")
                    .or_text("Sin resultados")),
                Matcher::IsVisible,
            )
            .soft(),
            Step::assert(
                "no movie cards",
                at(LocatorSpec::css("img[alt*='poster']").or_css(".movie-card")),
                Matcher::CountEquals(0),
            ),
            Step::capture("screenshot", "search no results"),
        ],
    )
    .tag("search")
    .entry("/")
}

/// Detail page shows title, image, overview and trailer button
#[must_use]
pub fn movie_detail() -> Scenario {
    let mut steps = Vec::new();
    open_first_movie(&mut steps);
    steps.extend([
        Step::assert(
            "title not empty",
            at(title()),
            Matcher::HasText(TextPattern::NonEmpty),
        ),
        Step::assert("backdrop visible", at(first_poster()), Matcher::IsVisible),
        Step::assert("overview visible", at(LocatorSpec::css("p").first()), Matcher::IsVisible),
        Step::assert("trailer button", at(trailer_button()), Matcher::IsVisible),
        Step::capture("screenshot", "movie details"),
    ]);
    scenario_with("movie detail", "intermediate", steps).entry("/")
}

/// Trailer modal opens with a player and closes on Escape
#[must_use]
pub fn trailer_modal() -> Scenario {
    let mut steps = Vec::new();
    open_first_movie(&mut steps);
    steps.extend([
        Step::click("open trailer", at(trailer_button())),
        Step::wait("player visible", Condition::Visible(trailer_player())),
        Step::capture("screenshot open", "trailer modal open"),
        Step::act(
            "press escape",
            at(trailer_player().first()),
            Action::Press("Escape".into()),
        ),
        Step::wait("player hidden", Condition::Hidden(trailer_player())),
        Step::capture("screenshot closed", "trailer modal closed"),
    ]);
    scenario_with("trailer modal", "intermediate", steps).entry("/")
}

/// Landmarks visible on a phone without horizontal scrolling
#[must_use]
pub fn mobile_responsive() -> Scenario {
    let device = DeviceDescriptor::IPHONE;
    scenario_with(
        "mobile responsive",
        "intermediate",
        vec![
            Step::viewport("phone viewport", device.viewport_width, device.viewport_height),
            Step::navigate("open home", "/"),
            Step::assert("logo visible", at(logo()), Matcher::IsVisible),
            Step::assert("title visible", at(title()), Matcher::IsVisible),
            Step::assert("poster visible", at(first_poster()), Matcher::IsVisible),
            Step::assert(
                "no horizontal scroll",
                Target::Page,
                Matcher::NoHorizontalOverflow { tolerance: 20 },
            ),
            Step::capture("screenshot", "mobile responsive"),
        ],
    )
}

// ============================================================================
// ADVANCED
// ============================================================================

/// Hero, trailer, trending, detail, search and back home in one session
#[must_use]
pub fn discovery_flow() -> Scenario {
    let mut steps = vec![
        Step::wait("hero title", Condition::Visible(title())),
        Step::capture("homepage", "flow homepage"),
        Step::click("hero trailer", at(trailer_button())),
        Step::wait("hero player", Condition::Visible(trailer_player())).soft(),
        Step::act(
            "close hero trailer",
            at(trailer_player().first()),
            Action::Press("Escape".into()),
        ),
        Step::capture("hero explored", "flow hero explored"),
        Step::click("open trending", at(LocatorSpec::text(TRENDING_LABEL).first())),
        Step::wait("network idle", Condition::NetworkIdle),
        Step::capture("trending", "flow trending page"),
    ];
    open_first_movie(&mut steps);
    steps.extend([
        Step::assert("detail title", at(title()), Matcher::IsVisible),
        Step::capture("details", "flow movie details"),
        Step::click("back home", at(logo())),
        Step::wait("home url", Condition::UrlMatches(home_url())),
        Step::resolve("search box", "search", search_input()),
        Step::act(
            "type query",
            Target::Binding("search".into()),
            Action::Fill("Avengers".into()),
        ),
        Step::act(
            "submit",
            Target::Binding("search".into()),
            Action::Press("Enter".into()),
        ),
        Step::wait(
            "results url",
            Condition::UrlMatches(UrlPattern::contains("search")),
        ),
        Step::capture("search results", "flow search results"),
        Step::click("explore more", at(logo())),
        Step::wait("home again", Condition::UrlMatches(home_url())),
        Step::capture("back to explore", "flow back to explore"),
    ]);
    scenario_with("discovery flow", "advanced", steps).entry("/")
}

/// Home, trending and detail each settle within their budget
#[must_use]
pub fn page_load_performance() -> Scenario {
    let idle = |name: &str, budget_ms: u64| {
        Step::wait(name, Condition::NetworkIdle)
            .with_policy(WaitPolicy::from_millis(budget_ms, 100))
    };
    let within = |name: &str, budget_ms: u64| {
        Step::assert(
            name,
            Target::Page,
            Matcher::PreviousStepWithin(Duration::from_millis(budget_ms)),
        )
    };
    scenario_with(
        "page load performance",
        "advanced",
        vec![
            Step::navigate("open home", "/"),
            idle("home idle", 10_000),
            within("home under 10s", 10_000),
            Step::capture("screenshot home", "performance homepage"),
            Step::click("open trending", at(LocatorSpec::text(TRENDING_LABEL).first())),
            idle("trending idle", 5_000),
            within("trending under 5s", 5_000),
            Step::wait("posters loaded", Condition::Visible(first_poster())),
            Step::click("open first movie", at(first_poster())),
            idle("detail idle", 3_000),
            within("detail under 3s", 3_000),
            Step::capture("screenshot details", "performance details"),
        ],
    )
}

/// The app keeps rendering while every second TMDB request fails
#[must_use]
pub fn api_error_resilience() -> Scenario {
    scenario_with(
        "api error resilience",
        "advanced",
        vec![
            Step::route(
                "fail every second tmdb request",
                UrlPattern::glob(TMDB_API_GLOB),
                RoutePolicy::AbortEveryNth {
                    n: 2,
                    reason: AbortReason::Failed,
                },
            ),
            Step::navigate("open home", "/"),
            settle(5_000),
            Step::assert(
                "title has no error",
                Target::Page,
                Matcher::TitleExcludes("Error".into()),
            ),
            Step::assert(
                "content or error message",
                at(LocatorSpec::css("h1")
                    .or_text("Error")
                    .or_text("No disponible")),
                Matcher::IsVisible,
            ),
            Step::capture("screenshot", "api errors handled"),
            Step::click("still navigable", at(LocatorSpec::text(TRENDING_LABEL).first())),
            settle(3_000),
            Step::capture("screenshot after", "navigation after errors"),
        ],
    )
    .with_policy(FailurePolicy::ContinueOnFailure)
}

/// One device: landmarks, overflow check (phones and tablets) and trending
#[must_use]
pub fn on_device(device: DeviceDescriptor) -> Scenario {
    let slug = device.name.to_lowercase();
    let mut steps = vec![
        Step::viewport(
            format!("{slug} viewport"),
            device.viewport_width,
            device.viewport_height,
        ),
        Step::navigate(format!("{slug} home"), "/"),
        Step::assert(format!("{slug} logo"), at(logo()), Matcher::IsVisible),
        Step::assert(format!("{slug} title"), at(title()), Matcher::IsVisible),
    ];
    if device.viewport_width <= 1024 {
        steps.push(Step::assert(
            format!("{slug} no horizontal scroll"),
            Target::Page,
            Matcher::NoHorizontalOverflow { tolerance: 20 },
        ));
    }
    steps.extend([
        Step::capture(format!("{slug} screenshot"), format!("device {slug}")),
        Step::click(
            format!("{slug} trending"),
            at(LocatorSpec::text(TRENDING_LABEL).first()),
        ),
        Step::wait(format!("{slug} posters"), Condition::Visible(first_poster())),
    ]);
    steps
        .into_iter()
        .fold(Scenario::new(format!("device {slug}")).tag("advanced").tag("device"), Scenario::step)
}

/// Every device in one session, one after another
#[must_use]
pub fn multi_device() -> Scenario {
    DeviceDescriptor::ALL
        .into_iter()
        .flat_map(|device| on_device(device).steps)
        .fold(
            Scenario::new("multi device").tag("advanced").tag("device"),
            Scenario::step,
        )
}

/// One scenario per device, meant for concurrent runs
#[must_use]
pub fn device_sweep() -> Vec<Scenario> {
    DeviceDescriptor::ALL.into_iter().map(on_device).collect()
}

// ============================================================================
// PROJECT
// ============================================================================

/// TMDB is called with an API key and answers successfully
#[must_use]
pub fn tmdb_integration() -> Scenario {
    let tmdb = || UrlPattern::glob(TMDB_API_GLOB);
    let requests = |name: &str, expectation| {
        Step::assert(
            name,
            Target::Page,
            Matcher::Requests {
                pattern: tmdb(),
                expectation,
            },
        )
    };
    scenario_with(
        "tmdb integration",
        "project",
        vec![
            Step::wait("network idle", Condition::NetworkIdle),
            requests("tmdb called", RequestExpectation::AtLeast(1)),
            requests("api key sent", RequestExpectation::AllContain("api_key=".into())),
            requests("responses ok", RequestExpectation::AllStatusBelow(400)),
            Step::assert("movies rendered", at(posters()), Matcher::CountAtLeast(1)),
            Step::capture("screenshot", "tmdb integration working"),
        ],
    )
    .entry("/")
}

/// Every navigation section loads with posters and a heading
#[must_use]
pub fn all_sections() -> Scenario {
    let steps = SECTIONS.iter().flat_map(|(label, fragment)| {
        [
            Step::navigate(format!("{fragment}: home"), "/"),
            Step::click(
                format!("{fragment}: open"),
                at(LocatorSpec::text(*label).first()),
            ),
            Step::wait(
                format!("{fragment}: url"),
                Condition::UrlMatches(UrlPattern::contains(*fragment)),
            ),
            Step::wait(format!("{fragment}: idle"), Condition::NetworkIdle),
            Step::assert(
                format!("{fragment}: posters"),
                at(posters()),
                Matcher::CountAtLeast(1),
            ),
            Step::assert(
                format!("{fragment}: heading"),
                at(LocatorSpec::css("h1").or_css("h2").first()),
                Matcher::IsVisible,
            ),
            Step::capture(format!("{fragment}: screenshot"), format!("section {fragment}")),
        ]
    });
    steps.fold(
        Scenario::new("all sections").tag("project"),
        Scenario::step,
    )
}

/// TV series detail pages show season information
#[must_use]
pub fn tv_series() -> Scenario {
    scenario_with(
        "tv series",
        "project",
        vec![
            Step::click(
                "open series",
                at(LocatorSpec::text("Series").or_text("TV").or_text("📺").first()),
            ),
            Step::wait("network idle", Condition::NetworkIdle),
            Step::wait("posters loaded", Condition::Visible(first_poster())),
            Step::click("open first series", at(first_poster())),
            Step::wait(
                "series url",
                Condition::UrlMatches(UrlPattern::Regex(r"/tv/\d+".into())),
            ),
            Step::assert("series title", at(title()), Matcher::IsVisible),
            Step::assert(
                "season info",
                at(LocatorSpec::regex(r"(?i)\d+.*temporada")
                    .or_regex(r"(?i)\d+.*episodio")
                    .or_regex(r"(?i)season")
                    .first()),
                Matcher::IsVisible,
            )
            .soft(),
            Step::capture("screenshot", "tv series details"),
        ],
    )
    .entry("/")
}

/// Every journey, in catalog order
#[must_use]
pub fn all() -> Vec<Scenario> {
    vec![
        first_look(),
        homepage_loads(),
        logo_fallbacks(),
        posters_loaded(),
        trending_url(),
        missing_element_tolerated(),
        quick_flow(),
        hero_section(),
        trending_navigation(),
        carousel_scroll(),
        search_success(),
        search_empty(),
        movie_detail(),
        trailer_modal(),
        mobile_responsive(),
        discovery_flow(),
        page_load_performance(),
        api_error_resilience(),
        multi_device(),
        tmdb_integration(),
        all_sections(),
        tv_series(),
    ]
}

/// Journeys carrying `tag`
#[must_use]
pub fn tagged(tag: &str) -> Vec<Scenario> {
    all().into_iter().filter(|s| s.has_tag(tag)).collect()
}
