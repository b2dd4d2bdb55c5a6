//! A synthetic vehicle driving a circle, rendered as NMEA sentences.

use gnss_receiver::nmea::{
    self, CardinalDirection, Gga, Gsv, GsvInfo, Rmc, Sentence, Status, Talker, Utc, Vtg,
};

/// Simulation parameters; defaults circle over Munich at walking pace.
#[derive(Debug, Clone)]
pub struct Course {
    pub center_latitude: f64,
    pub center_longitude: f64,
    /// Circle radius in degrees of arc.
    pub radius: f64,
    /// Ground speed, knots.
    pub speed_knots: f64,
    pub satellites: u8,
}

impl Default for Course {
    fn default() -> Self {
        Self {
            center_latitude: 48.117,
            center_longitude: 11.64,
            radius: 0.01,
            speed_knots: 4.0,
            satellites: 8,
        }
    }
}

fn to_nmea_latitude(degrees: f64) -> (nmea::Latitude, CardinalDirection) {
    let direction = if degrees < 0.0 {
        CardinalDirection::South
    } else {
        CardinalDirection::North
    };
    let magnitude = degrees.abs();
    let whole = magnitude.trunc() as u32;
    (
        nmea::Latitude {
            degrees: whole,
            minutes: (magnitude - whole as f64) * 60.0,
        },
        direction,
    )
}

fn to_nmea_longitude(degrees: f64) -> (nmea::Longitude, CardinalDirection) {
    let direction = if degrees < 0.0 {
        CardinalDirection::West
    } else {
        CardinalDirection::East
    };
    let magnitude = degrees.abs();
    let whole = magnitude.trunc() as u32;
    (
        nmea::Longitude {
            degrees: whole,
            minutes: (magnitude - whole as f64) * 60.0,
        },
        direction,
    )
}

impl Course {
    /// Sentences for the fix at `tick` seconds into the simulation.
    pub fn sentences_at(&self, tick: u64) -> Vec<Sentence> {
        let angle = (tick as f64).to_radians();
        let latitude = self.center_latitude + self.radius * angle.cos();
        let longitude = self.center_longitude + self.radius * angle.sin();
        // Moving along the circle tangent.
        let course = (angle.to_degrees() + 90.0).rem_euclid(360.0);

        let (lat, lat_dir) = to_nmea_latitude(latitude);
        let (lon, lon_dir) = to_nmea_longitude(longitude);
        let utc = Utc {
            hours: ((tick / 3600) % 24) as u8,
            minutes: ((tick / 60) % 60) as u8,
            seconds: (tick % 60) as f64,
        };

        let gga = Gga {
            talker: Talker::Gp,
            utc: Some(utc),
            latitude: Some(lat),
            latitude_direction: Some(lat_dir),
            longitude: Some(lon),
            longitude_direction: Some(lon_dir),
            fix_mode: Some(nmea::gps::FixMode::GpsSps),
            satellites_in_use: Some(self.satellites),
            hdop: Some(0.9),
            altitude: Some(545.4),
            geoidal_separation: Some(46.9),
            age: None,
            differential_reference_station: None,
        };

        let rmc = Rmc {
            talker: Talker::Gp,
            utc: Some(utc),
            status: Some(Status::Valid),
            latitude: Some(lat),
            latitude_direction: Some(lat_dir),
            longitude: Some(lon),
            longitude_direction: Some(lon_dir),
            speed_over_ground: Some(self.speed_knots),
            course_over_ground: Some(course),
            date: Some(nmea::Date {
                day: 14,
                month: 7,
                year: 16,
            }),
            magnetic_variation: None,
            magnetic_variation_direction: None,
            mode: Some(nmea::Mode::Autonomous),
        };

        let vtg = Vtg {
            talker: Talker::Gp,
            cog_true: Some(course),
            cog_magnetic: None,
            sog_knots: Some(self.speed_knots),
            sog_kmh: Some(self.speed_knots * 1.852),
            mode: Some(nmea::Mode::Autonomous),
        };

        let gsv = Gsv {
            talker: Talker::Gp,
            sentence_count: Some(1),
            sentence_number: Some(1),
            satellites_count: Some(self.satellites.min(4)),
            satellites_info: (0..self.satellites.min(4))
                .map(|i| GsvInfo {
                    satellite_id: Some(i + 1),
                    elevation: Some(30 + 5 * i),
                    azimuth: Some(45 * i as u16),
                    snr: Some(38 + i),
                })
                .collect(),
        };

        vec![
            Sentence::Gga(gga),
            Sentence::Rmc(rmc),
            Sentence::Vtg(vtg),
            Sentence::Gsv(gsv),
        ]
    }

    /// One tick's worth of wire bytes.
    pub fn bytes_at(&self, tick: u64) -> Vec<u8> {
        self.sentences_at(tick)
            .iter()
            .map(nmea::generate_sentence)
            .collect::<String>()
            .into_bytes()
    }
}
