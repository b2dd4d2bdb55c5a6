//! The in-tree GNSS provider: drives a serial (or replayed) receiver and
//! maps NMEA/UBX/SiRF traffic into typed updates.
//!
//! A reference position received over the event bus and an SNTP time sample
//! are used to seed receiver assistance data, cutting time to first fix.

use crate::events::Event;
use crate::provider::{
    Provider, ProviderError, ProviderHandle, ProviderId, Requirements, UpdateSignals,
};

use gnss_receiver::receiver::{
    open_replay, open_serial_port, Monitor, PortReceiver, SerialConfig, SirfReceiver, UbxReceiver,
};
use gnss_receiver::sntp;
use gnss_receiver::{nmea, sirf, ubx};

use location_types::{
    Criteria, Degrees, GnssId, Heading, Meters, MetersPerSecond, Position, SpaceVehicle,
    SpaceVehicleFlags, Update, Velocity,
};

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const KNOTS_TO_MPS: f64 = 0.514444;
const KMH_TO_MPS: f64 = 1.0 / 3.6;

// Rough horizontal error per unit of HDOP for a single-frequency receiver.
const UERE_METERS: f64 = 5.0;

/// Where the receiver's bytes come from.
#[derive(Debug, Clone)]
pub enum ByteSource {
    SerialPort { device: String, baud_rate: u32 },
    Replay { path: PathBuf },
}

/// Which binary framing the module speaks next to NMEA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverVariant {
    Ubx,
    Sirf,
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub source: ByteSource,
    pub variant: ReceiverVariant,
    pub sntp_host: String,
    pub sntp_timeout: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            source: ByteSource::SerialPort {
                device: "/dev/ttyUSB0".to_string(),
                baud_rate: SerialConfig::default().baud_rate,
            },
            variant: ReceiverVariant::Ubx,
            sntp_host: "pool.ntp.org".to_string(),
            sntp_timeout: Duration::from_secs(5),
        }
    }
}

/// State shared between the provider facade and the receiver task.
struct Shared {
    updates: UpdateSignals,
    reference_position: Mutex<Option<Update<Position>>>,
    // Space vehicles accumulated across the parts of one GSV set.
    partial_svs: Mutex<Vec<SpaceVehicle>>,
}

impl Shared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            updates: UpdateSignals::new(),
            reference_position: Mutex::new(None),
            partial_svs: Mutex::new(Vec::new()),
        })
    }
}

fn degrees_from_latitude(
    latitude: &nmea::Latitude,
    direction: Option<nmea::CardinalDirection>,
) -> Degrees {
    let magnitude = latitude.degrees as f64 + latitude.minutes / 60.0;
    match direction {
        Some(nmea::CardinalDirection::South) => Degrees(-magnitude),
        _ => Degrees(magnitude),
    }
}

fn degrees_from_longitude(
    longitude: &nmea::Longitude,
    direction: Option<nmea::CardinalDirection>,
) -> Degrees {
    let magnitude = longitude.degrees as f64 + longitude.minutes / 60.0;
    match direction {
        Some(nmea::CardinalDirection::West) => Degrees(-magnitude),
        _ => Degrees(magnitude),
    }
}

fn heading_update(course_degrees: f64) -> Option<Update<Heading>> {
    Heading::new(Degrees(course_degrees.rem_euclid(360.0)))
        .ok()
        .map(Update::new)
}

fn velocity_update(speed_mps: f64) -> Option<Update<Velocity>> {
    Velocity::new(MetersPerSecond(speed_mps)).ok().map(Update::new)
}

fn talker_constellation(talker: nmea::Talker) -> GnssId {
    match talker {
        nmea::Talker::Gl => GnssId::Glonass,
        nmea::Talker::Gp | nmea::Talker::Gn => GnssId::Gps,
    }
}

fn ubx_constellation(gnss_id: ubx::GnssId) -> GnssId {
    match gnss_id {
        ubx::GnssId::Gps => GnssId::Gps,
        ubx::GnssId::Sbas => GnssId::Sbas,
        ubx::GnssId::Galileo => GnssId::Galileo,
        ubx::GnssId::BeiDou => GnssId::Beidou,
        ubx::GnssId::Imes => GnssId::Imes,
        ubx::GnssId::Qzss => GnssId::Qzss,
        ubx::GnssId::Glonass => GnssId::Glonass,
    }
}

impl Monitor for Shared {
    fn on_new_nmea_sentence(&self, sentence: &nmea::Sentence) {
        match sentence {
            nmea::Sentence::Gga(gga) => self.on_gga(gga),
            nmea::Sentence::Rmc(rmc) => self.on_rmc(rmc),
            nmea::Sentence::Vtg(vtg) => self.on_vtg(vtg),
            nmea::Sentence::Gsv(gsv) => self.on_gsv(gsv),
            // GLL adds nothing over GGA/RMC; GSA and TXT carry no updates.
            _ => {}
        }
    }

    fn on_new_ubx_message(&self, message: &ubx::Message) {
        match message {
            ubx::Message::NavPvt(pvt) => self.on_nav_pvt(pvt),
            ubx::Message::NavSat(sat) => self.on_nav_sat(sat),
            ubx::Message::AckAck(ack) => {
                debug!("receiver acknowledged {:#04x}/{:#04x}", ack.class_id, ack.message_id);
            }
            ubx::Message::AckNak(nak) => {
                warn!("receiver rejected {:#04x}/{:#04x}", nak.class_id, nak.message_id);
            }
            _ => {}
        }
    }

    fn on_new_sirf_message(&self, message: &sirf::Message) {
        if let sirf::Message::GeodeticNavigationData(geo) = message {
            self.on_geodetic(geo);
        }
    }
}

impl Shared {
    fn on_gga(&self, gga: &nmea::Gga) {
        if matches!(gga.fix_mode, None | Some(nmea::gps::FixMode::Invalid)) {
            return;
        }
        let (Some(latitude), Some(longitude)) = (&gga.latitude, &gga.longitude) else {
            return;
        };
        let Ok(mut position) = Position::new(
            degrees_from_latitude(latitude, gga.latitude_direction),
            degrees_from_longitude(longitude, gga.longitude_direction),
        ) else {
            return;
        };
        if let Some(altitude) = gga.altitude {
            position = position.with_altitude(Meters(altitude));
        }
        if let Some(hdop) = gga.hdop {
            position = position.with_horizontal_accuracy(Meters(hdop * UERE_METERS));
        }
        self.updates.position.emit(&Update::new(position));
    }

    fn on_rmc(&self, rmc: &nmea::Rmc) {
        if rmc.status != Some(nmea::Status::Valid) {
            return;
        }
        if let (Some(latitude), Some(longitude)) = (&rmc.latitude, &rmc.longitude) {
            if let Ok(position) = Position::new(
                degrees_from_latitude(latitude, rmc.latitude_direction),
                degrees_from_longitude(longitude, rmc.longitude_direction),
            ) {
                self.updates.position.emit(&Update::new(position));
            }
        }
        if let Some(update) = rmc
            .speed_over_ground
            .and_then(|knots| velocity_update(knots * KNOTS_TO_MPS))
        {
            self.updates.velocity.emit(&update);
        }
        if let Some(update) = rmc.course_over_ground.and_then(heading_update) {
            self.updates.heading.emit(&update);
        }
    }

    fn on_vtg(&self, vtg: &nmea::Vtg) {
        let speed = vtg
            .sog_kmh
            .map(|kmh| kmh * KMH_TO_MPS)
            .or_else(|| vtg.sog_knots.map(|knots| knots * KNOTS_TO_MPS));
        if let Some(update) = speed.and_then(velocity_update) {
            self.updates.velocity.emit(&update);
        }
        if let Some(update) = vtg.cog_true.and_then(heading_update) {
            self.updates.heading.emit(&update);
        }
    }

    fn on_gsv(&self, gsv: &nmea::Gsv) {
        let constellation = talker_constellation(gsv.talker);
        let mut partial = self.partial_svs.lock().expect("gsv accumulator poisoned");
        if gsv.sentence_number == Some(1) {
            partial.clear();
        }
        for info in &gsv.satellites_info {
            let Some(satellite_id) = info.satellite_id else {
                continue;
            };
            let mut sv = SpaceVehicle::new(constellation, satellite_id as u16);
            sv.snr = info.snr.map(f64::from);
            sv.elevation = info.elevation.map(|e| Degrees(f64::from(e)));
            sv.azimuth = info.azimuth.map(|a| Degrees(f64::from(a)));
            partial.push(sv);
        }
        if gsv.sentence_number == gsv.sentence_count {
            let complete = std::mem::take(&mut *partial);
            drop(partial);
            self.updates.space_vehicles.emit(&Update::new(complete));
        }
    }

    fn on_nav_pvt(&self, pvt: &ubx::nav::Pvt) {
        if !matches!(
            pvt.fix_type,
            ubx::nav::FixType::Fix2d
                | ubx::nav::FixType::Fix3d
                | ubx::nav::FixType::GnssAndDeadReckoning
        ) {
            return;
        }
        if let Ok(position) = Position::new(Degrees(pvt.latitude), Degrees(pvt.longitude)) {
            let position = position
                .with_altitude(Meters(pvt.height.above_msl as f64 * 1e-3))
                .with_horizontal_accuracy(Meters(pvt.accuracy.horizontal as f64 * 1e-3))
                .with_vertical_accuracy(Meters(pvt.accuracy.vertical as f64 * 1e-3));
            self.updates.position.emit(&Update::new(position));
        }
        if let Some(update) = velocity_update(pvt.speed_over_ground as f64 * 1e-3) {
            self.updates.velocity.emit(&update);
        }
        if let Some(update) = heading_update(pvt.heading.motion) {
            self.updates.heading.emit(&update);
        }
    }

    fn on_nav_sat(&self, sat: &ubx::nav::Sat) {
        let vehicles: Vec<SpaceVehicle> = sat
            .info
            .iter()
            .map(|info| {
                let mut sv =
                    SpaceVehicle::new(ubx_constellation(info.gnss_id), info.satellite_id as u16);
                sv.snr = Some(f64::from(info.carrier_to_noise));
                sv.elevation = Some(Degrees(f64::from(info.elevation)));
                sv.azimuth = Some(Degrees(f64::from(info.azimuth)));
                if info.flags.contains(ubx::nav::SatInfoFlags::SV_USED) {
                    sv.flags |= SpaceVehicleFlags::USED_IN_FIX;
                }
                if info
                    .flags
                    .contains(ubx::nav::SatInfoFlags::EPHEMERIS_AVAILABLE)
                {
                    sv.flags |= SpaceVehicleFlags::HAS_EPHEMERIS;
                }
                if info
                    .flags
                    .contains(ubx::nav::SatInfoFlags::ALMANAC_AVAILABLE)
                {
                    sv.flags |= SpaceVehicleFlags::HAS_ALMANAC;
                }
                sv
            })
            .collect();
        self.updates.space_vehicles.emit(&Update::new(vehicles));
    }

    fn on_geodetic(&self, geo: &sirf::GeodeticNavigationData) {
        if !geo.is_valid_fix() {
            return;
        }
        if let Ok(position) = Position::new(
            Degrees(geo.latitude_degrees()),
            Degrees(geo.longitude_degrees()),
        ) {
            let position = position
                .with_altitude(Meters(geo.altitude_msl_meters()))
                .with_horizontal_accuracy(Meters(geo.horizontal_position_error_meters()))
                .with_vertical_accuracy(Meters(geo.vertical_position_error_meters()));
            self.updates.position.emit(&Update::new(position));
        }
        if let Some(update) = velocity_update(geo.speed_over_ground_mps()) {
            self.updates.velocity.emit(&update);
        }
        if let Some(update) = heading_update(geo.course_over_ground_degrees()) {
            self.updates.heading.emit(&update);
        }
    }
}

// ── Assistance seeding ────────────────────────────────────────────────────────

/// WGS84 geodetic to earth-centered earth-fixed, meters.
fn wgs84_to_ecef(latitude: Degrees, longitude: Degrees, altitude: Meters) -> (f64, f64, f64) {
    const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
    const FLATTENING: f64 = 1.0 / 298.257_223_563;

    let e2 = FLATTENING * (2.0 - FLATTENING);
    let lat = latitude.0.to_radians();
    let lon = longitude.0.to_radians();
    let n = SEMI_MAJOR_AXIS / (1.0 - e2 * lat.sin().powi(2)).sqrt();
    let h = altitude.0;

    (
        (n + h) * lat.cos() * lon.cos(),
        (n + h) * lat.cos() * lon.sin(),
        (n * (1.0 - e2) + h) * lat.sin(),
    )
}

/// GPS week number and time of week for a wall-clock instant.
fn gps_week_and_tow(time: DateTime<Utc>) -> (u16, u32) {
    let gps_epoch = Utc
        .with_ymd_and_hms(1980, 1, 6, 0, 0, 0)
        .single()
        .expect("the GPS epoch is a valid instant");
    let elapsed = (time - gps_epoch).num_seconds().max(0) as u64;
    const WEEK_SECONDS: u64 = 7 * 24 * 3600;
    ((elapsed / WEEK_SECONDS) as u16, (elapsed % WEEK_SECONDS) as u32)
}

fn assistance_seed(
    reference: Option<Update<Position>>,
    time: Option<DateTime<Utc>>,
) -> sirf::InitializeDataSource {
    let mut reset = sirf::ResetConfiguration::RTC_IS_NOT_PRECISE;
    let (x, y, z) = match reference {
        Some(update) => {
            reset |= sirf::ResetConfiguration::DATA_VALID;
            wgs84_to_ecef(
                update.value.latitude(),
                update.value.longitude(),
                update.value.altitude.unwrap_or(Meters(0.0)),
            )
        }
        None => (0.0, 0.0, 0.0),
    };
    let (week_number, time_of_week) = time.map(gps_week_and_tow).unwrap_or((0, 0));

    sirf::InitializeDataSource {
        ecef_x: x as i32,
        ecef_y: y as i32,
        ecef_z: z as i32,
        clock_drift: 0,
        time_of_week,
        week_number,
        channels: sirf::InitializeDataSource::MAX_NUMBER_CHANNELS,
        reset_configuration: reset,
    }
}

// ── The provider ──────────────────────────────────────────────────────────────

/// Provider facade over the receiver task.
pub struct GnssProvider {
    id: ProviderId,
    configuration: Configuration,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GnssProvider {
    pub fn new(configuration: Configuration) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::allocate(),
            configuration,
            shared: Shared::new(),
            worker: Mutex::new(None),
        })
    }
}

/// Registry hook.
pub fn create_for_registry() -> anyhow::Result<ProviderHandle> {
    Ok(GnssProvider::new(Configuration::default()))
}

async fn prime_reference_time(config: &Configuration) -> Option<DateTime<Utc>> {
    match sntp::Client::request_time(&config.sntp_host, config.sntp_timeout).await {
        Ok(sample) => {
            info!(
                "sntp time from {}: {} (rtt {:?})",
                config.sntp_host, sample.ntp_time, sample.round_trip_time
            );
            Some(sample.ntp_time)
        }
        Err(e) => {
            warn!("sntp priming failed, starting cold: {e}");
            None
        }
    }
}

async fn run_receiver(config: Configuration, shared: Arc<Shared>) -> anyhow::Result<()> {
    match (&config.source, config.variant) {
        (ByteSource::Replay { path }, ReceiverVariant::Ubx) => {
            let file = open_replay(path).await?;
            PortReceiver::new(file, UbxReceiver::new(shared)).run().await?;
        }
        (ByteSource::Replay { path }, ReceiverVariant::Sirf) => {
            let file = open_replay(path).await?;
            PortReceiver::new(file, SirfReceiver::new(shared)).run().await?;
        }
        (ByteSource::SerialPort { device, baud_rate }, ReceiverVariant::Ubx) => {
            let port = open_serial_port(device, SerialConfig { baud_rate: *baud_rate })?;
            let mut receiver = PortReceiver::new(port, UbxReceiver::new(shared));

            prime_reference_time(&config).await;
            for message in [
                ubx::Message::CfgMsg(ubx::cfg::Msg::on_current_port(
                    ubx::class::NAV,
                    ubx::nav::Pvt::MESSAGE_ID,
                    1,
                )),
                ubx::Message::CfgMsg(ubx::cfg::Msg::on_current_port(
                    ubx::class::NAV,
                    ubx::nav::Sat::MESSAGE_ID,
                    1,
                )),
            ] {
                receiver.send_encoded(&message.encode()?).await?;
            }
            receiver.run().await?;
        }
        (ByteSource::SerialPort { device, baud_rate }, ReceiverVariant::Sirf) => {
            let port = open_serial_port(device, SerialConfig { baud_rate: *baud_rate })?;
            let reference = shared
                .reference_position
                .lock()
                .expect("reference position poisoned")
                .clone();
            let mut receiver = PortReceiver::new(port, SirfReceiver::new(shared));

            let time = prime_reference_time(&config).await;
            let seed = sirf::Message::InitializeDataSource(assistance_seed(reference, time));
            receiver.send_encoded(&seed.encode()?).await?;
            let rate = sirf::Message::SetMessageRate(sirf::SetMessageRate {
                mode: 0,
                message_id: sirf::GeodeticNavigationData::MESSAGE_ID,
                cycle_period: 1,
            });
            receiver.send_encoded(&rate.encode()?).await?;
            receiver.run().await?;
        }
    }
    Ok(())
}

impl Provider for GnssProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn enable(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn disable(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn activate(&self) -> Result<(), ProviderError> {
        let mut worker = self.worker.lock().expect("gnss worker slot poisoned");
        if worker.is_some() {
            return Ok(());
        }
        let config = self.configuration.clone();
        let shared = self.shared.clone();
        *worker = Some(tokio::spawn(async move {
            if let Err(e) = run_receiver(config, shared).await {
                warn!("gnss receiver stopped: {e}");
            }
        }));
        Ok(())
    }

    fn deactivate(&self) -> Result<(), ProviderError> {
        if let Some(worker) = self
            .worker
            .lock()
            .expect("gnss worker slot poisoned")
            .take()
        {
            worker.abort();
        }
        Ok(())
    }

    fn requirements(&self) -> Requirements {
        Requirements::SATELLITES
    }

    fn satisfies(&self, _criteria: &Criteria) -> bool {
        // Satellites provide position, altitude, velocity and heading alike.
        true
    }

    fn on_new_event(&self, event: &Event) {
        if let Event::ReferencePositionUpdated(update) = event {
            *self
                .shared
                .reference_position
                .lock()
                .expect("reference position poisoned") = Some(*update);
        }
    }

    fn updates(&self) -> &UpdateSignals {
        &self.shared.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Arc<Shared> {
        Shared::new()
    }

    #[test]
    fn gga_maps_to_a_position_update() {
        let shared = shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _c = shared
            .updates
            .position
            .connect(move |u| sink.lock().unwrap().push(*u));

        let sentence = nmea::parse_sentence(
            "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n",
        )
        .unwrap();
        shared.on_new_nmea_sentence(&sentence);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let position = seen[0].value;
        assert!((position.latitude().0 - (48.0 + 7.038 / 60.0)).abs() < 1e-9);
        assert!((position.longitude().0 - (11.0 + 31.0 / 60.0)).abs() < 1e-9);
        assert_eq!(position.altitude, Some(Meters(545.4)));
        assert_eq!(
            position.accuracy.horizontal,
            Some(Meters(0.9 * UERE_METERS))
        );
    }

    #[test]
    fn southern_and_western_coordinates_are_negative() {
        let shared = shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _c = shared
            .updates
            .position
            .connect(move |u| sink.lock().unwrap().push(*u));

        let payload = "GPGGA,123519,3352.000,S,15112.000,W,1,08,0.9,10.0,M,,M,,";
        let raw = format!("${payload}*{:02X}\r\n", nmea::checksum(payload));
        shared.on_new_nmea_sentence(&nmea::parse_sentence(&raw).unwrap());

        let seen = seen.lock().unwrap();
        assert!(seen[0].value.latitude().0 < 0.0);
        assert!(seen[0].value.longitude().0 < 0.0);
    }

    #[test]
    fn invalid_fix_is_dropped() {
        let shared = shared();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = seen.clone();
        let _c = shared.updates.position.connect(move |_| {
            *sink.lock().unwrap() += 1;
        });

        let payload = "GPGGA,123519,4807.038,N,01131.000,E,0,00,,,M,,M,,";
        let raw = format!("${payload}*{:02X}\r\n", nmea::checksum(payload));
        shared.on_new_nmea_sentence(&nmea::parse_sentence(&raw).unwrap());
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn rmc_emits_velocity_and_heading() {
        let shared = shared();
        let velocities = Arc::new(Mutex::new(Vec::new()));
        let headings = Arc::new(Mutex::new(Vec::new()));
        let sink = velocities.clone();
        let _cv = shared
            .updates
            .velocity
            .connect(move |u| sink.lock().unwrap().push(*u));
        let sink = headings.clone();
        let _ch = shared
            .updates
            .heading
            .connect(move |u| sink.lock().unwrap().push(*u));

        let sentence = nmea::parse_sentence(
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
        )
        .unwrap();
        shared.on_new_nmea_sentence(&sentence);

        let velocities = velocities.lock().unwrap();
        assert!((velocities[0].value.speed().0 - 22.4 * KNOTS_TO_MPS).abs() < 1e-9);
        let headings = headings.lock().unwrap();
        assert!((headings[0].value.degrees().0 - 84.4).abs() < 1e-9);
    }

    #[test]
    fn multi_part_gsv_is_accumulated_before_emission() {
        let shared = shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _c = shared
            .updates
            .space_vehicles
            .connect(move |u| sink.lock().unwrap().push(u.value.clone()));

        let part1 = "GPGSV,2,1,06,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45";
        let part2 = "GPGSV,2,2,06,21,60,120,50,25,30,270,38";
        for payload in [part1, part2] {
            let raw = format!("${payload}*{:02X}\r\n", nmea::checksum(payload));
            shared.on_new_nmea_sentence(&nmea::parse_sentence(&raw).unwrap());
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 6);
        assert_eq!(seen[0][0].key.satellite_id, 1);
        assert_eq!(seen[0][5].key.satellite_id, 25);
        assert_eq!(seen[0][4].snr, Some(50.0));
    }

    #[test]
    fn nav_pvt_maps_to_position_with_metric_accuracy() {
        let shared = shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _c = shared
            .updates
            .position
            .connect(move |u| sink.lock().unwrap().push(*u));

        let pvt = ubx::nav::Pvt {
            itow: 0,
            year: 2016,
            month: 7,
            day: 14,
            hour: 8,
            minute: 30,
            second: 59,
            date_time_validity: ubx::nav::DateTimeValidity::empty(),
            time_accuracy: 0,
            nanoseconds: 0,
            fix_type: ubx::nav::FixType::Fix3d,
            fix_status_flags: 1,
            additional_flags: 0,
            satellite_count: 8,
            longitude: 11.64,
            latitude: 48.117,
            height: ubx::nav::Height {
                above_ellipsoid: 545_400,
                above_msl: 498_500,
            },
            accuracy: ubx::nav::Accuracy {
                horizontal: 5_000,
                vertical: 8_000,
                speed: 120,
                heading: 5.0,
            },
            velocity: ubx::nav::Velocity {
                north: 0,
                east: 0,
                down: 0,
            },
            speed_over_ground: 2_240,
            heading: ubx::nav::HeadingPair {
                motion: 84.4,
                vehicle: 84.5,
            },
            pdop: 190,
        };
        shared.on_new_ubx_message(&ubx::Message::NavPvt(pvt));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].value.accuracy.horizontal, Some(Meters(5.0)));
        assert_eq!(seen[0].value.altitude, Some(Meters(498.5)));
    }

    #[test]
    fn reference_position_event_is_retained_for_seeding() {
        let provider = GnssProvider::new(Configuration::default());
        let update = Update::new(
            Position::new(Degrees(48.0), Degrees(11.0))
                .unwrap()
                .with_altitude(Meters(500.0)),
        );
        provider.on_new_event(&Event::ReferencePositionUpdated(update));
        assert_eq!(
            *provider.shared.reference_position.lock().unwrap(),
            Some(update)
        );
    }

    #[test]
    fn ecef_conversion_is_sane() {
        // Somewhere near Munich: x ~4.18e6, y ~0.86e6, z ~4.73e6.
        let (x, y, z) = wgs84_to_ecef(Degrees(48.117), Degrees(11.64), Meters(500.0));
        assert!((4.0e6..4.4e6).contains(&x), "x = {x}");
        assert!((0.7e6..1.0e6).contains(&y), "y = {y}");
        assert!((4.5e6..4.9e6).contains(&z), "z = {z}");
    }

    #[test]
    fn gps_week_rolls_over_weekly() {
        let time = Utc.with_ymd_and_hms(1980, 1, 13, 0, 0, 30).single().unwrap();
        let (week, tow) = gps_week_and_tow(time);
        assert_eq!(week, 1);
        assert_eq!(tow, 30);
    }
}
