//! Henderson / Green Valley insulation permit fixtures.
//!
//! Coordinates are real residential blocks around Henderson, NV, so
//! Haversine distances between them look like a genuine canvassing day.

use field_route_planner::model::{Coordinates, Stop};

/// A permit record as the lead store would hand it over.
#[derive(Debug, Clone)]
pub struct Permit {
    pub id: &'static str,
    pub address: &'static str,
    pub city: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub priority: f64,
}

impl Permit {
    pub const fn new(
        id: &'static str,
        address: &'static str,
        lat: f64,
        lng: f64,
        priority: f64,
    ) -> Self {
        Self {
            id,
            address,
            city: "Henderson",
            lat,
            lng,
            priority,
        }
    }

    pub fn to_stop(&self) -> Stop {
        Stop::new(self.id, Coordinates::new(self.lat, self.lng), self.address)
            .with_city(self.city)
            .with_priority(self.priority)
    }
}

/// Contractor yard, where the day starts and ends.
pub const SHOP: Coordinates = Coordinates::new(36.0395, -115.0622);
pub const SHOP_ADDRESS: &str = "2360 Corporate Cir, Henderson, NV";

// ============================================================================
// Green Valley Ranch and Anthem permits
// ============================================================================

pub const HENDERSON_PERMITS: &[Permit] = &[
    Permit::new("BP-24-1103", "2281 Paseo Verde Pkwy", 36.0308, -115.0825, 72.0),
    Permit::new("BP-24-1187", "1420 Sunset Station Dr", 36.0614, -115.0631, 55.0),
    Permit::new("BP-24-1201", "215 Islander Way", 36.0335, -114.9856, 90.0),
    Permit::new("BP-24-1244", "88 Naga Ct", 36.0138, -114.9929, 40.0),
    Permit::new("BP-24-1302", "731 Ribbon Grass Ave", 35.9950, -115.1000, 64.0),
    Permit::new("BP-24-1339", "2555 Wigwam Pkwy", 36.0090, -114.9917, 81.0),
    Permit::new("BP-24-1376", "10 Sushi Ln", 35.9917, -115.1028, 47.0),
    Permit::new("BP-24-1410", "3120 Arroyo Grande Blvd", 36.0450, -115.0482, 58.0),
];

pub fn henderson_stops() -> Vec<Stop> {
    HENDERSON_PERMITS.iter().map(Permit::to_stop).collect()
}

/// `count` distinct stops on a small grid; priority falls with index so
/// ranking by priority keeps input order.
pub fn grid_stops(count: usize) -> Vec<Stop> {
    (0..count)
        .map(|i| {
            let row = (i / 6) as f64;
            let col = (i % 6) as f64;
            Stop::new(
                format!("s{i}"),
                Coordinates::new(36.00 + row * 0.01, -115.10 + col * 0.01),
                format!("{} Canvass Ave", 100 + i),
            )
            .with_city("Henderson")
            .with_priority(100.0 - i as f64)
        })
        .collect()
}
