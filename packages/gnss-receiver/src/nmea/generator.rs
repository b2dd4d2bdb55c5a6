//! Sentence generation: the typed [`Sentence`] sum back into wire form.
//!
//! Used by the send path, the simulator and the round-trip tests. Numeric
//! fields are emitted in the canonical widths receivers produce themselves
//! (two-digit degrees plus `MM.mmm` minutes, `hhmmss.ss` time stamps).

use crate::nmea::{
    checksum, CardinalDirection, Date, Gga, Gll, Gsa, GsaFixMode, GsaOperationMode, Gsv, Latitude,
    Longitude, Mode, Rmc, Sentence, Status, Txt, Utc, Vtg,
};

use std::fmt::Write;

fn push_opt(out: &mut String, field: Option<impl std::fmt::Display>) {
    out.push(',');
    if let Some(value) = field {
        let _ = write!(out, "{value}");
    }
}

fn push_opt_str(out: &mut String, field: Option<&str>) {
    out.push(',');
    if let Some(value) = field {
        out.push_str(value);
    }
}

struct Angle<'a, T>(&'a Option<T>, usize);

impl std::fmt::Display for Angle<'_, Latitude> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lat = self.0.as_ref().unwrap();
        write!(f, "{:0width$}{:06.3}", lat.degrees, lat.minutes, width = self.1)
    }
}

impl std::fmt::Display for Angle<'_, Longitude> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lon = self.0.as_ref().unwrap();
        write!(f, "{:0width$}{:06.3}", lon.degrees, lon.minutes, width = self.1)
    }
}

fn push_latitude(out: &mut String, lat: &Option<Latitude>) {
    match lat {
        Some(_) => push_opt(out, Some(Angle(lat, 2))),
        None => out.push(','),
    }
}

fn push_longitude(out: &mut String, lon: &Option<Longitude>) {
    match lon {
        Some(_) => push_opt(out, Some(Angle(lon, 3))),
        None => out.push(','),
    }
}

fn push_utc(out: &mut String, utc: &Option<Utc>) {
    out.push(',');
    if let Some(utc) = utc {
        let _ = write!(out, "{:02}{:02}{:05.2}", utc.hours, utc.minutes, utc.seconds);
    }
}

fn push_date(out: &mut String, date: &Option<Date>) {
    out.push(',');
    if let Some(date) = date {
        let _ = write!(out, "{:02}{:02}{:02}", date.day, date.month, date.year);
    }
}

fn push_cardinal(out: &mut String, dir: &Option<CardinalDirection>) {
    push_opt_str(out, dir.as_ref().map(CardinalDirection::as_str));
}

fn push_status(out: &mut String, status: &Option<Status>) {
    push_opt_str(
        out,
        status.as_ref().map(|s| match s {
            Status::Valid => "A",
            Status::NotValid => "V",
        }),
    );
}

fn push_mode(out: &mut String, mode: &Option<Mode>) {
    push_opt_str(
        out,
        mode.as_ref().map(|m| match m {
            Mode::Autonomous => "A",
            Mode::Differential => "D",
            Mode::Estimated => "E",
            Mode::Manual => "M",
            Mode::Simulator => "S",
            Mode::NotValid => "N",
        }),
    );
}

/// Serializes a sentence, appending the `*HH` checksum and CRLF.
pub fn generate_sentence(sentence: &Sentence) -> String {
    let mut payload = String::new();
    match sentence {
        Sentence::Gga(gga) => generate_gga(&mut payload, gga),
        Sentence::Gll(gll) => generate_gll(&mut payload, gll),
        Sentence::Gsa(gsa) => generate_gsa(&mut payload, gsa),
        Sentence::Gsv(gsv) => generate_gsv(&mut payload, gsv),
        Sentence::Rmc(rmc) => generate_rmc(&mut payload, rmc),
        Sentence::Vtg(vtg) => generate_vtg(&mut payload, vtg),
        Sentence::Txt(txt) => generate_txt(&mut payload, txt),
    }
    format!("${payload}*{:02X}\r\n", checksum(&payload))
}

fn generate_gga(out: &mut String, gga: &Gga) {
    out.push_str(gga.talker.as_str());
    out.push_str("GGA");
    push_utc(out, &gga.utc);
    push_latitude(out, &gga.latitude);
    push_cardinal(out, &gga.latitude_direction);
    push_longitude(out, &gga.longitude);
    push_cardinal(out, &gga.longitude_direction);
    push_opt(out, gga.fix_mode.map(|m| m as u8));
    match gga.satellites_in_use {
        Some(n) => {
            let _ = write!(out, ",{n:02}");
        }
        None => out.push(','),
    }
    push_opt(out, gga.hdop);
    push_opt(out, gga.altitude);
    push_opt_str(out, gga.altitude.map(|_| "M"));
    push_opt(out, gga.geoidal_separation);
    push_opt_str(out, gga.geoidal_separation.map(|_| "M"));
    push_opt(out, gga.age);
    push_opt(out, gga.differential_reference_station);
}

fn generate_gll(out: &mut String, gll: &Gll) {
    out.push_str(gll.talker.as_str());
    out.push_str("GLL");
    push_latitude(out, &gll.latitude);
    push_cardinal(out, &gll.latitude_direction);
    push_longitude(out, &gll.longitude);
    push_cardinal(out, &gll.longitude_direction);
    push_utc(out, &gll.utc);
    push_status(out, &gll.status);
    push_mode(out, &gll.mode);
}

fn generate_gsa(out: &mut String, gsa: &Gsa) {
    out.push_str(gsa.talker.as_str());
    out.push_str("GSA");
    push_opt_str(
        out,
        gsa.operation_mode.as_ref().map(|m| match m {
            GsaOperationMode::Manual => "M",
            GsaOperationMode::Automatic => "A",
        }),
    );
    push_opt(out, gsa.fix_mode.map(|m| m as u8));
    for slot in 0..Gsa::MAX_SATELLITES {
        match gsa.satellite_ids.get(slot).copied().flatten() {
            Some(id) => {
                let _ = write!(out, ",{id:02}");
            }
            None => out.push(','),
        }
    }
    push_opt(out, gsa.pdop);
    push_opt(out, gsa.hdop);
    push_opt(out, gsa.vdop);
}

fn generate_gsv(out: &mut String, gsv: &Gsv) {
    out.push_str(gsv.talker.as_str());
    out.push_str("GSV");
    push_opt(out, gsv.sentence_count);
    push_opt(out, gsv.sentence_number);
    push_opt(out, gsv.satellites_count);
    for info in &gsv.satellites_info {
        match info.satellite_id {
            Some(id) => {
                let _ = write!(out, ",{id:02}");
            }
            None => out.push(','),
        }
        match info.elevation {
            Some(el) => {
                let _ = write!(out, ",{el:02}");
            }
            None => out.push(','),
        }
        match info.azimuth {
            Some(az) => {
                let _ = write!(out, ",{az:03}");
            }
            None => out.push(','),
        }
        match info.snr {
            Some(snr) => {
                let _ = write!(out, ",{snr:02}");
            }
            None => out.push(','),
        }
    }
}

fn generate_rmc(out: &mut String, rmc: &Rmc) {
    out.push_str(rmc.talker.as_str());
    out.push_str("RMC");
    push_utc(out, &rmc.utc);
    push_status(out, &rmc.status);
    push_latitude(out, &rmc.latitude);
    push_cardinal(out, &rmc.latitude_direction);
    push_longitude(out, &rmc.longitude);
    push_cardinal(out, &rmc.longitude_direction);
    push_opt(out, rmc.speed_over_ground);
    push_opt(out, rmc.course_over_ground);
    push_date(out, &rmc.date);
    push_opt(out, rmc.magnetic_variation);
    push_cardinal(out, &rmc.magnetic_variation_direction);
    push_mode(out, &rmc.mode);
}

fn generate_vtg(out: &mut String, vtg: &Vtg) {
    out.push_str(vtg.talker.as_str());
    out.push_str("VTG");
    push_opt(out, vtg.cog_true);
    push_opt_str(out, vtg.cog_true.map(|_| "T"));
    push_opt(out, vtg.cog_magnetic);
    push_opt_str(out, vtg.cog_magnetic.map(|_| "M"));
    push_opt(out, vtg.sog_knots);
    push_opt_str(out, vtg.sog_knots.map(|_| "N"));
    push_opt(out, vtg.sog_kmh);
    push_opt_str(out, vtg.sog_kmh.map(|_| "K"));
    push_mode(out, &vtg.mode);
}

fn generate_txt(out: &mut String, txt: &Txt) {
    out.push_str(txt.talker.as_str());
    out.push_str("TXT");
    match txt.total_number_of_sentences {
        Some(n) => {
            let _ = write!(out, ",{n:02}");
        }
        None => out.push(','),
    }
    match txt.sentence_number {
        Some(n) => {
            let _ = write!(out, ",{n:02}");
        }
        None => out.push(','),
    }
    match txt.identifier {
        Some(n) => {
            let _ = write!(out, ",{n:02}");
        }
        None => out.push(','),
    }
    push_opt_str(out, txt.message.as_deref());
}
