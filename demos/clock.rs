//! Three ways of putting the same clock component on a page.
//!
//! - `<react-clock>` is a hand-written custom element that renders the clock into itself.
//! - `<portal-clock>`, `<portal-clock-closed>` and `<portal-clock-open>` are generated by
//!   `wrap_as_web_component`; one overlay per tag portals the clock into every instance, into the
//!   light DOM or into a closed / open shadow root.
//!
//! Every clock shows a `<clock-ticks>` element that follows the shared ticker on its own, so the
//! portals only re-render when an instance's `prefix` changes.
//!
//! Run with `cargo run --example clock`.

use elemental::prelude::*;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

const TICKS: u64 = 3;

/// The value every clock shows. Each patch is one tick.
type Ticker = SignalingCell<u64>;

fn clock_view(prefix: Option<&str>) -> VNode {
    VNode::element("div").children([
        VNode::text(prefix.unwrap_or_default()),
        VNode::element("clock-ticks"),
    ])
}

/// The clock as a component.
fn clock(props: &Props) -> VNode {
    clock_view(props.get("prefix"))
}

/// Renders the ticker's value into itself and re-renders on every tick while connected.
struct TicksElement {
    ticker: Ticker,
    mounted: Rc<RefCell<Option<Mounted>>>,
    epoch: Rc<Cell<u64>>,
}

fn ticks_view(ticker: &Ticker) -> VNode {
    VNode::text(format!("tick {}", ticker.get_state().unwrap_or_default()))
}

impl CustomElement for TicksElement {
    fn connected_callback(&self, this: &ElementRef) {
        match render_into(this.document(), this.id(), &ticks_view(&self.ticker)) {
            Ok(mounted) => *self.mounted.borrow_mut() = Some(mounted),
            Err(err) => log::warn!("could not render the ticks: {err}"),
        }

        self.epoch.set(self.epoch.get() + 1);
        let epoch = self.epoch.get();

        let ticker = self.ticker.clone();
        let mounted = self.mounted.clone();
        let current = self.epoch.clone();
        tokio::task::spawn_local(async move {
            loop {
                ticker.next().await;
                if current.get() != epoch {
                    break;
                }
                if let Some(mounted) = mounted.borrow_mut().as_mut() {
                    if let Err(err) = mounted.replace(&ticks_view(&ticker)) {
                        log::warn!("could not re-render the ticks: {err}");
                    }
                }
            }
        });
    }

    fn disconnected_callback(&self, _this: &ElementRef) {
        self.epoch.set(self.epoch.get() + 1);
        if let Some(mounted) = self.mounted.borrow_mut().take() {
            if let Err(err) = mounted.unmount() {
                log::warn!("could not unmount the ticks: {err}");
            }
        }
    }
}

/// A custom element that renders the clock into itself, without a portal.
#[derive(Default)]
struct ClockElement {
    mounted: RefCell<Option<Mounted>>,
}

impl CustomElement for ClockElement {
    fn connected_callback(&self, this: &ElementRef) {
        match render_into(this.document(), this.id(), &clock_view(None)) {
            Ok(mounted) => *self.mounted.borrow_mut() = Some(mounted),
            Err(err) => log::warn!("could not render the clock: {err}"),
        }
    }

    fn disconnected_callback(&self, _this: &ElementRef) {
        if let Some(mounted) = self.mounted.borrow_mut().take() {
            if let Err(err) = mounted.unmount() {
                log::warn!("could not unmount the clock: {err}");
            }
        }
    }
}

fn define_clock_elements(document: &Document, ticker: &Ticker) -> Result<(), DomError> {
    if !document.is_defined("clock-ticks") {
        let ticker = ticker.clone();
        document.define(
            "clock-ticks",
            ElementDefinition::new(Vec::<String>::new(), move || TicksElement {
                ticker: ticker.clone(),
                mounted: Default::default(),
                epoch: Default::default(),
            }),
        )?;
    }

    if !document.is_defined("react-clock") {
        document.define(
            "react-clock",
            ElementDefinition::new(Vec::<String>::new(), ClockElement::default),
        )?;
    }

    Ok(())
}

const PAGE: &str = r#"<h1>Hello, World!</h1>
<h2>Custom element</h2>
<react-clock></react-clock>
<h2>Via ref</h2>
<div id="container"></div>
<h2>Via Portal</h2>
<portal-clock prefix="The time now is: "></portal-clock>
<h2>Via Portal (Closed)</h2>
<portal-clock-closed prefix="The time now is: "></portal-clock-closed>
<h2>Via Portal (Open)</h2>
<portal-clock-open prefix="The time now is: "></portal-clock-open>"#;

async fn app() -> anyhow::Result<()> {
    let document = Document::new();
    let body = document.body();
    let ticker = Ticker::new(0);

    define_clock_elements(&document, &ticker)?;

    let overlays = [
        ("portal-clock", WrapConfig::new()),
        (
            "portal-clock-closed",
            WrapConfig::new().with_shadow_mode(ShadowMode::Closed),
        ),
        (
            "portal-clock-open",
            WrapConfig::new().with_shadow_mode(ShadowMode::Open),
        ),
    ]
    .into_iter()
    .map(|(tag, cfg)| wrap_as_web_component(&document, clock, tag, ["prefix"], cfg))
    .collect::<Result<Vec<_>, _>>()?;

    // every overlay is mounted exactly once, for the lifetime of the page
    let portals = overlays
        .iter()
        .map(Overlay::mount)
        .collect::<Result<Vec<_>, _>>()?;
    for portal in &portals {
        tokio::task::spawn_local(portal.run());
    }

    document.append_markup(body, PAGE)?;

    if let Some(container) = document
        .query_selector_all(body, "div")
        .into_iter()
        .find(|div| document.get_attribute(*div, "id").as_deref() == Some("container"))
    {
        let element = document.create_element("react-clock");
        document.append_child(container, element)?;
    }

    for _ in 0..TICKS {
        tokio::time::sleep(Duration::from_millis(500)).await;
        ticker.patch_state(|tick| tick.copied().unwrap_or_default() + 1);

        tokio::task::yield_now().await;
        println!("{}\n", document.composed_html(body));
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;

    tokio::task::LocalSet::new().run_until(app()).await
}
