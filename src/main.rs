#![windows_subsystem = "windows"]

mod chart;
mod logger;

use chart::PriceChart;
use data::{BarSequence, InternalError};
use exchange::{Bar, FeedSession, Granularity, Product, Source, Timeframe};

use iced::widget::{Row, button, column, container, row, text};
use iced::{Alignment, Element, Length, Subscription, Task, keyboard, window};
use std::time::Instant;

fn main() -> iced::Result {
    if let Err(e) = logger::setup(cfg!(debug_assertions)) {
        eprintln!("Failed to initialize logger: {e}");
    }

    let args = Args::parse(std::env::args().skip(1));

    iced::application(
        move || OpenChart::new(args.clone()),
        OpenChart::update,
        OpenChart::view,
    )
    .title(OpenChart::title)
    .subscription(OpenChart::subscription)
    .window(window::Settings {
        exit_on_close_request: false,
        ..Default::default()
    })
    .antialiasing(true)
    .run()
}

/// `openchart [PRODUCT] [--synthetic]`
#[derive(Debug, Clone, Default)]
struct Args {
    product: Product,
    source: Source,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Self {
        let mut parsed = Self::default();

        for arg in args {
            match arg.as_str() {
                "--synthetic" => parsed.source = Source::Synthetic,
                id => match Product::new(id) {
                    Ok(product) => parsed.product = product,
                    Err(e) => log::warn!("Ignoring argument: {e}"),
                },
            }
        }

        parsed
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone)]
enum Message {
    Chart(chart::Message),
    TimeframeSelected(Timeframe),
    Reload,
    BarsFetched {
        request_id: u64,
        granularity: Granularity,
        result: Result<Vec<Bar>, InternalError>,
    },
    Feed(exchange::Event),
    KineticTick(Instant),
    Keyboard(keyboard::Event),
    CloseRequested(window::Id),
}

struct OpenChart {
    chart: PriceChart,
    product: Product,
    source: Source,
    timeframe: Timeframe,
    feed: FeedSession,
    feed_connected: bool,
    /// Responses to older requests are dropped.
    request_id: u64,
    status: Status,
}

impl OpenChart {
    fn new(args: Args) -> (Self, Task<Message>) {
        let config = data::config::load().unwrap_or_else(|e| {
            log::error!("Failed to load config, using defaults: {e}");
            data::Config::default()
        });

        let mut app = Self {
            chart: PriceChart::new(config),
            product: args.product.clone(),
            source: args.source,
            timeframe: Timeframe::default(),
            feed: FeedSession::new(args.source, args.product),
            feed_connected: false,
            request_id: 0,
            status: Status::Loading,
        };

        let fetch = app.fetch();
        let feed = Task::run(app.feed.start(), Message::Feed);

        (app, Task::batch([fetch, feed]))
    }

    fn title(&self) -> String {
        format!("openchart - {} ({})", self.product, self.source)
    }

    fn fetch(&mut self) -> Task<Message> {
        self.request_id += 1;
        self.status = Status::Loading;

        let request_id = self.request_id;
        let granularity = self.timeframe.granularity();
        let (start, end) = self.timeframe.range_ending(chrono::Utc::now());
        let source = self.source;
        let product = self.product.clone();

        log::info!(
            "Fetching {product} {} bars from {start} to {end} ({source})",
            granularity
        );

        Task::perform(
            async move {
                exchange::adapter::fetch_bars(source, &product, start, end, granularity)
                    .await
                    .map_err(InternalError::from)
            },
            move |result| Message::BarsFetched {
                request_id,
                granularity,
                result,
            },
        )
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Chart(message) => self.chart.update(message),
            Message::TimeframeSelected(timeframe) => {
                if timeframe != self.timeframe {
                    self.timeframe = timeframe;
                    self.chart.load(BarSequence::default());
                    return self.fetch();
                }
            }
            Message::Reload => {
                self.chart.load(BarSequence::default());
                return self.fetch();
            }
            Message::BarsFetched {
                request_id,
                granularity,
                result,
            } => {
                if request_id != self.request_id {
                    log::debug!("Dropping stale response for request {request_id}");
                    return Task::none();
                }

                match result {
                    Ok(bars) => {
                        log::info!("Loaded {} bars", bars.len());
                        self.chart
                            .load(BarSequence::new(bars, granularity.seconds()));
                        self.status = Status::Ready;
                    }
                    Err(e) => {
                        log::error!("Failed to fetch bars: {e}");
                        self.chart.load(BarSequence::default());
                        self.status = Status::Failed(e.to_string());
                    }
                }
            }
            Message::Feed(event) => match event {
                exchange::Event::Connected(source) => {
                    log::info!("{source} feed connected for {}", self.product);
                    self.feed_connected = true;
                }
                exchange::Event::Disconnected(source, reason) => {
                    log::warn!("{source} feed disconnected: {reason}");
                    self.feed_connected = false;
                }
                exchange::Event::Tick(product, tick) => {
                    if product == self.product {
                        self.chart.set_live_price(Some(tick.price));
                    }
                }
            },
            Message::KineticTick(_) => self.chart.tick(),
            Message::Keyboard(event) => {
                if let Some(message) = chart::keyboard_nav::handle(&event, self.chart.state()) {
                    self.chart.update(message);
                }
            }
            Message::CloseRequested(id) => {
                self.chart.teardown();
                self.feed.stop();
                return window::close(id);
            }
        }

        Task::none()
    }

    fn view(&self) -> Element<'_, Message> {
        let timeframes = Row::with_children(Timeframe::ALL.into_iter().map(|timeframe| {
            let label = text(timeframe.to_string()).size(12);

            if timeframe == self.timeframe {
                button(label).into()
            } else {
                button(label)
                    .on_press(Message::TimeframeSelected(timeframe))
                    .into()
            }
        }))
        .spacing(4);

        let status = match &self.status {
            Status::Loading => text("Loading..."),
            Status::Ready => text(format!(
                "{} bars{}",
                self.chart.state().bars().len(),
                if self.feed_connected { ", live" } else { "" }
            )),
            Status::Failed(reason) => text(format!("Error: {reason}")),
        }
        .size(12);

        let header = row![
            text(self.product.to_string()).size(16),
            timeframes,
            button(text("Reload").size(12)).on_press(Message::Reload),
            status,
        ]
        .spacing(12)
        .align_y(Alignment::Center);

        container(column![header, self.chart.view().map(Message::Chart)].spacing(8))
            .padding(8)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        let kinetic = match self.chart.state().kinetic_interval() {
            Some(interval) => iced::time::every(interval).map(Message::KineticTick),
            None => Subscription::none(),
        };

        let hotkeys = keyboard::listen().filter_map(|event| {
            matches!(event, keyboard::Event::KeyPressed { .. }).then_some(Message::Keyboard(event))
        });

        let close_requests = window::close_requests().map(Message::CloseRequested);

        Subscription::batch([kinetic, hotkeys, close_requests])
    }
}
