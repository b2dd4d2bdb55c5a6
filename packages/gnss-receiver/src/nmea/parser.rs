//! Sentence parsing: `$TTSSS,…*HH` into the typed [`Sentence`] sum.

use crate::nmea::{
    checksum, gps, CardinalDirection, Date, Gga, Gll, Gsa, GsaFixMode, GsaOperationMode, Gsv,
    GsvInfo, Latitude, Longitude, Mode, Rmc, Sentence, SentenceError, Status, Talker, Txt, Utc,
    Vtg,
};

use std::str::FromStr;

/// Walks the comma-separated fields of a payload, treating empty fields as
/// absent values.
struct Fields<'a> {
    iter: std::str::Split<'a, char>,
}

impl<'a> Fields<'a> {
    fn new(payload: &'a str) -> Self {
        Self {
            iter: payload.split(','),
        }
    }

    /// Next raw field; `None` once the sentence is exhausted.
    fn next_raw(&mut self) -> Option<&'a str> {
        self.iter.next()
    }

    /// Next field as an optional string; exhaustion folds into `None` so
    /// that sentences with trailing fields omitted still parse.
    fn next_opt(&mut self) -> Option<&'a str> {
        self.iter.next().filter(|s| !s.is_empty())
    }

    fn parse<T: FromStr>(&mut self) -> Result<Option<T>, SentenceError> {
        match self.next_opt() {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
                SentenceError::MalformedField {
                    field: raw.to_string(),
                    reason: "not a number",
                }
            }),
        }
    }

    fn cardinal(&mut self) -> Result<Option<CardinalDirection>, SentenceError> {
        match self.next_opt() {
            None => Ok(None),
            Some("N") => Ok(Some(CardinalDirection::North)),
            Some("S") => Ok(Some(CardinalDirection::South)),
            Some("E") => Ok(Some(CardinalDirection::East)),
            Some("W") => Ok(Some(CardinalDirection::West)),
            Some(raw) => Err(SentenceError::MalformedField {
                field: raw.to_string(),
                reason: "not a cardinal direction",
            }),
        }
    }

    fn status(&mut self) -> Result<Option<Status>, SentenceError> {
        match self.next_opt() {
            None => Ok(None),
            Some("A") => Ok(Some(Status::Valid)),
            Some("V") => Ok(Some(Status::NotValid)),
            Some(raw) => Err(SentenceError::MalformedField {
                field: raw.to_string(),
                reason: "not a status flag",
            }),
        }
    }

    fn mode(&mut self) -> Result<Option<Mode>, SentenceError> {
        match self.next_opt() {
            None => Ok(None),
            Some("A") => Ok(Some(Mode::Autonomous)),
            Some("D") => Ok(Some(Mode::Differential)),
            Some("E") => Ok(Some(Mode::Estimated)),
            Some("M") => Ok(Some(Mode::Manual)),
            Some("S") => Ok(Some(Mode::Simulator)),
            Some("N") => Ok(Some(Mode::NotValid)),
            Some(raw) => Err(SentenceError::MalformedField {
                field: raw.to_string(),
                reason: "not a mode indicator",
            }),
        }
    }

    fn latitude(&mut self) -> Result<Option<Latitude>, SentenceError> {
        Ok(self
            .angle()?
            .map(|(degrees, minutes)| Latitude { degrees, minutes }))
    }

    fn longitude(&mut self) -> Result<Option<Longitude>, SentenceError> {
        Ok(self
            .angle()?
            .map(|(degrees, minutes)| Longitude { degrees, minutes }))
    }

    /// DDMM.mmm / DDDMM.mmm: minutes are the last two digits of the integer
    /// part plus the fraction, everything before is whole degrees.
    fn angle(&mut self) -> Result<Option<(u32, f64)>, SentenceError> {
        let raw = match self.next_opt() {
            None => return Ok(None),
            Some(raw) => raw,
        };
        let split_at = raw.find('.').unwrap_or(raw.len());
        if split_at < 2 {
            return Err(SentenceError::MalformedField {
                field: raw.to_string(),
                reason: "too short for DDMM.mmm",
            });
        }
        let (deg, min) = raw.split_at(split_at - 2);
        let degrees = if deg.is_empty() {
            0
        } else {
            deg.parse::<u32>().map_err(|_| SentenceError::MalformedField {
                field: raw.to_string(),
                reason: "degrees are not a number",
            })?
        };
        let minutes = min.parse::<f64>().map_err(|_| SentenceError::MalformedField {
            field: raw.to_string(),
            reason: "minutes are not a number",
        })?;
        Ok(Some((degrees, minutes)))
    }

    /// hhmmss.sss
    fn utc(&mut self) -> Result<Option<Utc>, SentenceError> {
        let raw = match self.next_opt() {
            None => return Ok(None),
            Some(raw) => raw,
        };
        let malformed = |reason| SentenceError::MalformedField {
            field: raw.to_string(),
            reason,
        };
        if raw.len() < 6 {
            return Err(malformed("too short for hhmmss"));
        }
        let hours = raw[0..2].parse().map_err(|_| malformed("bad hours"))?;
        let minutes = raw[2..4].parse().map_err(|_| malformed("bad minutes"))?;
        let seconds = raw[4..].parse().map_err(|_| malformed("bad seconds"))?;
        Ok(Some(Utc {
            hours,
            minutes,
            seconds,
        }))
    }

    /// ddmmyy
    fn date(&mut self) -> Result<Option<Date>, SentenceError> {
        let raw = match self.next_opt() {
            None => return Ok(None),
            Some(raw) => raw,
        };
        let malformed = |reason| SentenceError::MalformedField {
            field: raw.to_string(),
            reason,
        };
        if raw.len() != 6 {
            return Err(malformed("not ddmmyy"));
        }
        Ok(Some(Date {
            day: raw[0..2].parse().map_err(|_| malformed("bad day"))?,
            month: raw[2..4].parse().map_err(|_| malformed("bad month"))?,
            year: raw[4..6].parse().map_err(|_| malformed("bad year"))?,
        }))
    }
}

/// Parses a full sentence, validating framing and checksum.
///
/// Accepts the scanner output verbatim, i.e. a trailing CRLF is allowed but
/// not required.
pub fn parse_sentence(raw: &str) -> Result<Sentence, SentenceError> {
    let trimmed = raw.trim_end_matches(['\r', '\n']);
    let body = trimmed
        .strip_prefix('$')
        .ok_or(SentenceError::MissingPrefix)?;

    let (payload, cs) = body.rsplit_once('*').ok_or(SentenceError::MissingChecksum)?;
    let expected =
        u8::from_str_radix(cs, 16).map_err(|_| SentenceError::MissingChecksum)?;
    let computed = checksum(payload);
    if computed != expected {
        return Err(SentenceError::ChecksumMismatch { expected, computed });
    }

    let mut fields = Fields::new(payload);
    let header = fields.next_raw().ok_or(SentenceError::Truncated)?;
    if header.len() != 5 {
        return Err(SentenceError::UnknownSentenceId(header.to_string()));
    }
    let talker = match &header[0..2] {
        "GL" => Talker::Gl,
        "GN" => Talker::Gn,
        "GP" => Talker::Gp,
        other => return Err(SentenceError::UnknownTalker(other.to_string())),
    };

    match &header[2..5] {
        "GGA" => parse_gga(talker, fields),
        "GLL" => parse_gll(talker, fields),
        "GSA" => parse_gsa(talker, fields),
        "GSV" => parse_gsv(talker, fields),
        "RMC" => parse_rmc(talker, fields),
        "VTG" => parse_vtg(talker, fields),
        "TXT" => parse_txt(talker, fields),
        other => Err(SentenceError::UnknownSentenceId(other.to_string())),
    }
}

fn parse_gga(talker: Talker, mut f: Fields<'_>) -> Result<Sentence, SentenceError> {
    let utc = f.utc()?;
    let latitude = f.latitude()?;
    let latitude_direction = f.cardinal()?;
    let longitude = f.longitude()?;
    let longitude_direction = f.cardinal()?;
    let fix_mode = match f.parse::<u8>()? {
        None => None,
        Some(0) => Some(gps::FixMode::Invalid),
        Some(1) => Some(gps::FixMode::GpsSps),
        Some(2) => Some(gps::FixMode::DifferentialGpsSps),
        Some(3) => Some(gps::FixMode::GpsPps),
        Some(4) => Some(gps::FixMode::RealTimeKinematic),
        Some(5) => Some(gps::FixMode::FloatRtk),
        Some(6) => Some(gps::FixMode::Estimated),
        Some(7) => Some(gps::FixMode::ManualInput),
        Some(8) => Some(gps::FixMode::Simulation),
        Some(other) => {
            return Err(SentenceError::MalformedField {
                field: other.to_string(),
                reason: "not a GPS quality indicator",
            })
        }
    };
    let satellites_in_use = f.parse()?;
    let hdop = f.parse()?;
    let altitude = f.parse()?;
    f.next_opt(); // altitude unit, always M
    let geoidal_separation = f.parse()?;
    f.next_opt(); // separation unit, always M
    let age = f.parse()?;
    let differential_reference_station = f.parse()?;

    Ok(Sentence::Gga(Gga {
        talker,
        utc,
        latitude,
        latitude_direction,
        longitude,
        longitude_direction,
        fix_mode,
        satellites_in_use,
        hdop,
        altitude,
        geoidal_separation,
        age,
        differential_reference_station,
    }))
}

fn parse_gll(talker: Talker, mut f: Fields<'_>) -> Result<Sentence, SentenceError> {
    Ok(Sentence::Gll(Gll {
        talker,
        latitude: f.latitude()?,
        latitude_direction: f.cardinal()?,
        longitude: f.longitude()?,
        longitude_direction: f.cardinal()?,
        utc: f.utc()?,
        status: f.status()?,
        mode: f.mode()?,
    }))
}

fn parse_gsa(talker: Talker, mut f: Fields<'_>) -> Result<Sentence, SentenceError> {
    let operation_mode = match f.next_opt() {
        None => None,
        Some("M") => Some(GsaOperationMode::Manual),
        Some("A") => Some(GsaOperationMode::Automatic),
        Some(raw) => {
            return Err(SentenceError::MalformedField {
                field: raw.to_string(),
                reason: "not an operation mode",
            })
        }
    };
    let fix_mode = match f.parse::<u8>()? {
        None => None,
        Some(1) => Some(GsaFixMode::FixNotAvailable),
        Some(2) => Some(GsaFixMode::FixIn2d),
        Some(3) => Some(GsaFixMode::FixIn3d),
        Some(other) => {
            return Err(SentenceError::MalformedField {
                field: other.to_string(),
                reason: "not a GSA fix mode",
            })
        }
    };

    // The sentence is positional: exactly 12 satellite slots, then the three
    // DOP fields. Anything beyond that count smuggles in extra satellites.
    let remaining: Vec<&str> = std::iter::from_fn(|| f.next_raw()).collect();
    if remaining.len() > Gsa::MAX_SATELLITES + 3 {
        return Err(SentenceError::TooManySatellites {
            max: Gsa::MAX_SATELLITES,
        });
    }
    let dop_fields = remaining.len().saturating_sub(Gsa::MAX_SATELLITES);
    let (sv_fields, dops) = remaining.split_at(remaining.len() - dop_fields);

    let parse_field = |raw: &&str| -> Result<Option<u8>, SentenceError> {
        if raw.is_empty() {
            Ok(None)
        } else {
            raw.parse().map(Some).map_err(|_| SentenceError::MalformedField {
                field: raw.to_string(),
                reason: "not a satellite id",
            })
        }
    };
    let parse_dop = |raw: Option<&&str>| -> Result<Option<f64>, SentenceError> {
        match raw {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| SentenceError::MalformedField {
                field: raw.to_string(),
                reason: "not a number",
            }),
        }
    };

    let satellite_ids = sv_fields.iter().map(parse_field).collect::<Result<_, _>>()?;

    Ok(Sentence::Gsa(Gsa {
        talker,
        operation_mode,
        fix_mode,
        satellite_ids,
        pdop: parse_dop(dops.first())?,
        hdop: parse_dop(dops.get(1))?,
        vdop: parse_dop(dops.get(2))?,
    }))
}

fn parse_gsv(talker: Talker, mut f: Fields<'_>) -> Result<Sentence, SentenceError> {
    let sentence_count = f.parse()?;
    let sentence_number = f.parse()?;
    let satellites_count = f.parse()?;

    let mut satellites_info = Vec::new();
    loop {
        let satellite_id = match f.next_raw() {
            None => break,
            Some(raw) if raw.is_empty() => None,
            Some(raw) => Some(raw.parse().map_err(|_| SentenceError::MalformedField {
                field: raw.to_string(),
                reason: "not a satellite id",
            })?),
        };
        let info = GsvInfo {
            satellite_id,
            elevation: f.parse()?,
            azimuth: f.parse()?,
            snr: f.parse()?,
        };
        satellites_info.push(info);
    }

    Ok(Sentence::Gsv(Gsv {
        talker,
        sentence_count,
        sentence_number,
        satellites_count,
        satellites_info,
    }))
}

fn parse_rmc(talker: Talker, mut f: Fields<'_>) -> Result<Sentence, SentenceError> {
    Ok(Sentence::Rmc(Rmc {
        talker,
        utc: f.utc()?,
        status: f.status()?,
        latitude: f.latitude()?,
        latitude_direction: f.cardinal()?,
        longitude: f.longitude()?,
        longitude_direction: f.cardinal()?,
        speed_over_ground: f.parse()?,
        course_over_ground: f.parse()?,
        date: f.date()?,
        magnetic_variation: f.parse()?,
        magnetic_variation_direction: f.cardinal()?,
        mode: f.mode()?,
    }))
}

fn parse_vtg(talker: Talker, mut f: Fields<'_>) -> Result<Sentence, SentenceError> {
    let cog_true = f.parse()?;
    f.next_opt(); // reference, always T
    let cog_magnetic = f.parse()?;
    f.next_opt(); // reference, always M
    let sog_knots = f.parse()?;
    f.next_opt(); // unit, always N
    let sog_kmh = f.parse()?;
    f.next_opt(); // unit, always K
    Ok(Sentence::Vtg(Vtg {
        talker,
        cog_true,
        cog_magnetic,
        sog_knots,
        sog_kmh,
        mode: f.mode()?,
    }))
}

fn parse_txt(talker: Talker, mut f: Fields<'_>) -> Result<Sentence, SentenceError> {
    Ok(Sentence::Txt(Txt {
        talker,
        total_number_of_sentences: f.parse()?,
        sentence_number: f.parse()?,
        identifier: f.parse()?,
        message: f.next_opt().map(str::to_string),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_reference_gga_sentence() {
        let sentence = parse_sentence(
            "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n",
        )
        .unwrap();
        let Sentence::Gga(gga) = sentence else {
            panic!("expected GGA");
        };
        assert_eq!(gga.talker, Talker::Gp);
        assert_eq!(
            gga.utc,
            Some(Utc {
                hours: 12,
                minutes: 35,
                seconds: 19.0
            })
        );
        assert_eq!(
            gga.latitude,
            Some(Latitude {
                degrees: 48,
                minutes: 7.038
            })
        );
        assert_eq!(gga.latitude_direction, Some(CardinalDirection::North));
        assert_eq!(
            gga.longitude,
            Some(Longitude {
                degrees: 11,
                minutes: 31.0
            })
        );
        assert_eq!(gga.longitude_direction, Some(CardinalDirection::East));
        assert_eq!(gga.fix_mode, Some(gps::FixMode::GpsSps));
        assert_eq!(gga.satellites_in_use, Some(8));
        assert_eq!(gga.hdop, Some(0.9));
        assert_eq!(gga.altitude, Some(545.4));
        assert_eq!(gga.geoidal_separation, Some(46.9));
        assert_eq!(gga.age, None);
        assert_eq!(gga.differential_reference_station, None);
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let err = parse_sentence("$GPGLL,4916.45,N,12311.12,W,225444,A,A*00\r\n").unwrap_err();
        assert!(matches!(err, SentenceError::ChecksumMismatch { .. }));
    }

    #[test]
    fn parses_gll() {
        let Sentence::Gll(gll) =
            parse_sentence("$GPGLL,4916.45,N,12311.12,W,225444,A,A*5C").unwrap()
        else {
            panic!("expected GLL");
        };
        assert_eq!(
            gll.latitude,
            Some(Latitude {
                degrees: 49,
                minutes: 16.45
            })
        );
        assert_eq!(gll.status, Some(Status::Valid));
        assert_eq!(gll.mode, Some(Mode::Autonomous));
    }

    #[test]
    fn parses_gsa_with_empty_slots() {
        let Sentence::Gsa(gsa) =
            parse_sentence("$GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1*39").unwrap()
        else {
            panic!("expected GSA");
        };
        assert_eq!(gsa.operation_mode, Some(GsaOperationMode::Automatic));
        assert_eq!(gsa.fix_mode, Some(GsaFixMode::FixIn3d));
        assert_eq!(gsa.satellite_ids.len(), 12);
        assert_eq!(gsa.satellite_ids[0], Some(4));
        assert_eq!(gsa.satellite_ids[2], None);
        assert_eq!(gsa.pdop, Some(2.5));
        assert_eq!(gsa.hdop, Some(1.3));
        assert_eq!(gsa.vdop, Some(2.1));
    }

    #[test]
    fn rejects_gsa_with_more_than_twelve_satellites() {
        // Thirteen satellite slots followed by the three DOP fields.
        let payload = "GPGSA,A,3,01,02,03,04,05,06,07,08,09,10,11,12,13,2.5,1.3,2.1";
        let raw = format!("${payload}*{:02X}", checksum(payload));
        assert_eq!(
            parse_sentence(&raw),
            Err(SentenceError::TooManySatellites { max: 12 })
        );
    }

    #[test]
    fn parses_multi_part_gsv() {
        let Sentence::Gsv(gsv) = parse_sentence(
            "$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74",
        )
        .unwrap() else {
            panic!("expected GSV");
        };
        assert_eq!(gsv.sentence_count, Some(3));
        assert_eq!(gsv.sentence_number, Some(1));
        assert_eq!(gsv.satellites_count, Some(11));
        assert_eq!(gsv.satellites_info.len(), 4);
        assert_eq!(gsv.satellites_info[1].satellite_id, Some(4));
        assert_eq!(gsv.satellites_info[1].azimuth, Some(270));
    }

    #[test]
    fn parses_rmc() {
        let Sentence::Rmc(rmc) = parse_sentence(
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
        )
        .unwrap() else {
            panic!("expected RMC");
        };
        assert_eq!(rmc.status, Some(Status::Valid));
        assert_eq!(rmc.speed_over_ground, Some(22.4));
        assert_eq!(rmc.course_over_ground, Some(84.4));
        assert_eq!(
            rmc.date,
            Some(Date {
                day: 23,
                month: 3,
                year: 94
            })
        );
        assert_eq!(rmc.magnetic_variation, Some(3.1));
        assert_eq!(rmc.magnetic_variation_direction, Some(CardinalDirection::West));
    }

    #[test]
    fn parses_vtg() {
        let Sentence::Vtg(vtg) =
            parse_sentence("$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K*48").unwrap()
        else {
            panic!("expected VTG");
        };
        assert_eq!(vtg.cog_true, Some(54.7));
        assert_eq!(vtg.cog_magnetic, Some(34.4));
        assert_eq!(vtg.sog_knots, Some(5.5));
        assert_eq!(vtg.sog_kmh, Some(10.2));
    }

    #[test]
    fn parses_txt() {
        let payload = "GPTXT,01,01,02,u-blox ag - www.u-blox.com";
        let raw = format!("${payload}*{:02X}", checksum(payload));
        let Sentence::Txt(txt) = parse_sentence(&raw).unwrap() else {
            panic!("expected TXT");
        };
        assert_eq!(txt.total_number_of_sentences, Some(1));
        assert_eq!(txt.identifier, Some(2));
        assert_eq!(txt.message.as_deref(), Some("u-blox ag - www.u-blox.com"));
    }

    #[test]
    fn rejects_unknown_talker_and_sentence() {
        let payload = "XXGGA,,,,,,,,,,,,,";
        let raw = format!("${payload}*{:02X}", checksum(payload));
        assert!(matches!(
            parse_sentence(&raw),
            Err(SentenceError::UnknownTalker(_))
        ));

        let payload = "GPZZZ,1";
        let raw = format!("${payload}*{:02X}", checksum(payload));
        assert!(matches!(
            parse_sentence(&raw),
            Err(SentenceError::UnknownSentenceId(_))
        ));
    }
}
