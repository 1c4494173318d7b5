//! Session start parameters and their defaulting rules.
//!
//! The display client sends connection parameters as a positional list of
//! strings, in the order announced by the `args` instruction ([`ARG_NAMES`]).
//! Empty strings mean "not specified".  [`SessionSettings::from_args`]
//! applies the defaulting rules:
//!
//! | parameter       | when empty / invalid                                     |
//! |-----------------|----------------------------------------------------------|
//! | `port`          | 3389, or 2179 when `vmconnect` is set                    |
//! | `width`/`height`| client's optimal size; 1024×768 if that is not positive  |
//! | `color-depth`   | 16 (also when `0`)                                       |
//! | `password`      | no auto logon                                            |
//! | `disable-audio` | audio enabled unless the value is exactly `true`         |
//!
//! A `vmconnect` value turns the session into a Hyper-V console connection:
//! the value is sent as the pre-connection blob and security layer
//! negotiation is disabled.

use std::fmt;

use tracing::{error, info};

use crate::domain::config::{CacheCapacities, RelayConfig};
use crate::domain::error::RelayError;

/// Connection parameter names, in wire order.
pub const ARG_NAMES: [&str; 13] = [
    "hostname",
    "port",
    "domain",
    "username",
    "password",
    "width",
    "height",
    "initial-program",
    "color-depth",
    "disable-audio",
    "console",
    "console-audio",
    "vmconnect",
];

const IDX_HOSTNAME: usize = 0;
const IDX_PORT: usize = 1;
const IDX_DOMAIN: usize = 2;
const IDX_USERNAME: usize = 3;
const IDX_PASSWORD: usize = 4;
const IDX_WIDTH: usize = 5;
const IDX_HEIGHT: usize = 6;
const IDX_INITIAL_PROGRAM: usize = 7;
const IDX_COLOR_DEPTH: usize = 8;
const IDX_DISABLE_AUDIO: usize = 9;
const IDX_CONSOLE: usize = 10;
const IDX_CONSOLE_AUDIO: usize = 11;
const IDX_VMCONNECT: usize = 12;

pub const RDP_DEFAULT_PORT: u16 = 3389;
pub const VMCONNECT_DEFAULT_PORT: u16 = 2179;
pub const RDP_DEFAULT_WIDTH: i32 = 1024;
pub const RDP_DEFAULT_HEIGHT: i32 = 768;
pub const RDP_DEFAULT_DEPTH: u32 = 16;

/// Message sent to the client when too few parameters arrive.
pub const WRONG_ARGUMENT_COUNT: &str = "Wrong argument count received.";

/// What the display client told us about itself during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Display size the client would like; `0` if not sent.
    pub optimal_width: i32,
    pub optimal_height: i32,
    /// Audio mimetypes the client can play, in preference order.
    pub audio_mimetypes: Vec<String>,
}

/// Drawing orders offered to the remote server.
///
/// Orders left `false` are rendered by the server into bitmaps instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderSupport {
    pub dstblt: bool,
    pub patblt: bool,
    pub scrblt: bool,
    pub memblt: bool,
    pub memblt_v2: bool,
    pub mem3blt: bool,
    pub mem3blt_v2: bool,
    pub opaque_rect: bool,
    pub multi_dstblt: bool,
    pub multi_patblt: bool,
    pub multi_scrblt: bool,
    pub multi_opaque_rect: bool,
    pub draw_nine_grid: bool,
    pub line_to: bool,
    pub polyline: bool,
    pub polygon: bool,
    pub ellipse: bool,
    pub save_bitmap: bool,
    pub glyph_index: bool,
    pub fast_index: bool,
    pub fast_glyph: bool,
}

impl OrderSupport {
    /// The order set this relay renders, given whether bitmap caching is on.
    pub fn negotiate(bitmap_cache: bool) -> Self {
        Self {
            dstblt: true,
            scrblt: true,
            opaque_rect: true,
            memblt: bitmap_cache,
            memblt_v2: bitmap_cache,
            glyph_index: true,
            fast_index: true,
            fast_glyph: true,
            ..Self::default()
        }
    }
}

/// Fully resolved parameters of one remote desktop session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub hostname: String,
    pub port: u16,
    pub domain: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Log on without prompting; set whenever a password is supplied.
    pub auto_logon: bool,
    pub width: i32,
    pub height: i32,
    pub color_depth: u32,
    /// Program to run instead of the desktop shell.
    pub alternate_shell: Option<String>,
    pub window_title: String,
    pub audio_enabled: bool,
    pub console: bool,
    pub console_audio: bool,
    pub negotiate_security_layer: bool,
    pub send_preconnection_pdu: bool,
    pub preconnection_blob: Option<String>,
    /// RDP keyboard layout id of the session keymap.
    pub keyboard_layout: u32,
    pub bitmap_cache_enabled: bool,
    pub order_support: OrderSupport,
    pub capacities: CacheCapacities,
}

// Hand-written so that passwords never reach a log line.
impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("color_depth", &self.color_depth)
            .field("audio_enabled", &self.audio_enabled)
            .field("console", &self.console)
            .field("preconnection_blob", &self.preconnection_blob)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Lenient integer parse: anything unparsable counts as `0`, which the
/// callers then treat as "invalid, use the default".
fn lenient_int(value: &str) -> i32 {
    value.trim().parse().unwrap_or(0)
}

impl SessionSettings {
    /// Resolves positional connection parameters.
    ///
    /// Extra parameters beyond [`ARG_NAMES`] are ignored.
    ///
    /// # Errors
    ///
    /// [`RelayError::BadArgument`] when fewer than 13 values arrive, the
    /// hostname is empty, or the port is not a valid port number.
    pub fn from_args(
        args: &[String],
        client: &ClientInfo,
        config: &RelayConfig,
        keyboard_layout: u32,
    ) -> Result<Self, RelayError> {
        if args.len() < ARG_NAMES.len() {
            return Err(RelayError::BadArgument(WRONG_ARGUMENT_COUNT.to_string()));
        }

        let hostname = args[IDX_HOSTNAME].clone();
        if hostname.is_empty() {
            return Err(RelayError::BadArgument("hostname is required".into()));
        }

        let explicit_port = match args[IDX_PORT].as_str() {
            "" => None,
            raw => Some(raw.trim().parse::<u16>().map_err(|_| {
                RelayError::BadArgument(format!("invalid port {raw:?}"))
            })?),
        };

        let mut width = client.optimal_width;
        if !args[IDX_WIDTH].is_empty() {
            width = lenient_int(&args[IDX_WIDTH]);
        }
        if width <= 0 {
            error!("invalid width {width}, using default of {RDP_DEFAULT_WIDTH}");
            width = RDP_DEFAULT_WIDTH;
        }

        let mut height = client.optimal_height;
        if !args[IDX_HEIGHT].is_empty() {
            height = lenient_int(&args[IDX_HEIGHT]);
        }
        if height <= 0 {
            error!("invalid height {height}, using default of {RDP_DEFAULT_HEIGHT}");
            height = RDP_DEFAULT_HEIGHT;
        }

        let mut color_depth = RDP_DEFAULT_DEPTH;
        if !args[IDX_COLOR_DEPTH].is_empty() {
            color_depth = u32::try_from(lenient_int(&args[IDX_COLOR_DEPTH])).unwrap_or(0);
        }
        if color_depth == 0 {
            info!("no color depth given, using default of {RDP_DEFAULT_DEPTH}");
            color_depth = RDP_DEFAULT_DEPTH;
        }

        let preconnection_blob = non_empty(&args[IDX_VMCONNECT]);
        let vmconnect = preconnection_blob.is_some();
        let port = match (explicit_port, vmconnect) {
            (Some(port), _) => port,
            (None, true) => VMCONNECT_DEFAULT_PORT,
            (None, false) => RDP_DEFAULT_PORT,
        };

        let password = non_empty(&args[IDX_PASSWORD]);

        Ok(Self {
            window_title: hostname.clone(),
            hostname,
            port,
            domain: non_empty(&args[IDX_DOMAIN]),
            username: non_empty(&args[IDX_USERNAME]),
            auto_logon: password.is_some(),
            password,
            width,
            height,
            color_depth,
            alternate_shell: non_empty(&args[IDX_INITIAL_PROGRAM]),
            audio_enabled: args[IDX_DISABLE_AUDIO] != "true",
            console: args[IDX_CONSOLE] == "true",
            console_audio: args[IDX_CONSOLE_AUDIO] == "true",
            negotiate_security_layer: !vmconnect,
            send_preconnection_pdu: vmconnect,
            preconnection_blob,
            keyboard_layout,
            bitmap_cache_enabled: config.bitmap_cache,
            order_support: OrderSupport::negotiate(config.bitmap_cache),
            capacities: config.capacities,
        })
    }
}
