use {
    crate::utils::days_in_month,
    anyhow::{bail, Result},
    ndarray::{Array1, ArrayView1},
    std::collections::BTreeMap,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Mean,
}

impl Aggregate {
    fn apply(self, xs: &[f64]) -> f64 {
        let sum = xs.iter().sum::<f64>();
        match self {
            Aggregate::Sum => sum,
            Aggregate::Mean => sum / xs.len() as f64,
        }
    }
}

/// One value per (year, month), twelve months for every year.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySeries {
    pub years: Array1<i32>,
    pub months: Array1<u32>,
    pub values: Array1<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearlySeries {
    pub years: Array1<i32>,
    pub values: Array1<f64>,
}

fn check_lengths(lengths: &[usize]) -> Result<()> {
    if lengths.windows(2).any(|w| w[0] != w[1]) {
        bail!("Input series have different lengths: {:?}", lengths);
    }
    Ok(())
}

/// Aggregates daily values to monthly values for every month of every year
/// present in `years`. Months with fewer values than days are `NaN`.
pub fn calc_monthly(
    years: ArrayView1<i32>,
    months: ArrayView1<u32>,
    values: ArrayView1<f64>,
    aggregate: Aggregate,
) -> Result<MonthlySeries> {
    check_lengths(&[years.len(), months.len(), values.len()])?;

    let mut groups = BTreeMap::<(i32, u32), Vec<f64>>::new();
    for ((year, month), value) in years.iter().zip(months.iter()).zip(values.iter()) {
        groups.entry((*year, *month)).or_default().push(*value);
    }

    let mut unique = years.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let mut out_years = Vec::with_capacity(unique.len() * 12);
    let mut out_months = Vec::with_capacity(unique.len() * 12);
    let mut out_values = Vec::with_capacity(unique.len() * 12);

    for year in unique {
        for month in 1..=12 {
            let complete = days_in_month(year, month).unwrap_or(0);
            let value = match groups.get(&(year, month)) {
                Some(xs) if xs.len() >= complete => aggregate.apply(xs),
                _ => f64::NAN,
            };

            out_years.push(year);
            out_months.push(month);
            out_values.push(value);
        }
    }

    Ok(MonthlySeries {
        years: Array1::from(out_years),
        months: Array1::from(out_months),
        values: Array1::from(out_values),
    })
}

pub fn calc_monthly_sum(
    years: ArrayView1<i32>,
    months: ArrayView1<u32>,
    values: ArrayView1<f64>,
) -> Result<MonthlySeries> {
    calc_monthly(years, months, values, Aggregate::Sum)
}

pub fn calc_monthly_mean(
    years: ArrayView1<i32>,
    months: ArrayView1<u32>,
    values: ArrayView1<f64>,
) -> Result<MonthlySeries> {
    calc_monthly(years, months, values, Aggregate::Mean)
}

/// Mean of the monthly values of each calendar month, ignoring `NaN` and any
/// year outside `yearmin..=yearmax`. A month without values is `NaN`.
pub fn calc_monthly_normals(
    years: ArrayView1<i32>,
    months: ArrayView1<u32>,
    values: ArrayView1<f64>,
    yearmin: Option<i32>,
    yearmax: Option<i32>,
) -> Result<Array1<f64>> {
    check_lengths(&[years.len(), months.len(), values.len()])?;
    if months.iter().any(|m| !(1..=12).contains(m)) {
        bail!("Months values must be between 1 and 12");
    }

    let mut sums = [0.0; 12];
    let mut counts = [0usize; 12];

    for ((year, month), value) in years.iter().zip(months.iter()).zip(values.iter()) {
        let in_range =
            yearmin.map_or(true, |min| *year >= min) && yearmax.map_or(true, |max| *year <= max);
        if in_range && !value.is_nan() {
            sums[*month as usize - 1] += value;
            counts[*month as usize - 1] += 1;
        }
    }

    Ok(sums
        .iter()
        .zip(counts.iter())
        .map(|(sum, &count)| {
            if count > 0 {
                sum / count as f64
            } else {
                f64::NAN
            }
        })
        .collect())
}

/// Aggregates daily values to one value per year.
pub fn calc_yearly(
    years: ArrayView1<i32>,
    values: ArrayView1<f64>,
    aggregate: Aggregate,
) -> Result<YearlySeries> {
    check_lengths(&[years.len(), values.len()])?;

    let mut groups = BTreeMap::<i32, Vec<f64>>::new();
    for (year, value) in years.iter().zip(values.iter()) {
        groups.entry(*year).or_default().push(*value);
    }

    let (out_years, out_values): (Vec<_>, Vec<_>) = groups
        .into_iter()
        .map(|(year, xs)| (year, aggregate.apply(&xs)))
        .unzip();

    Ok(YearlySeries {
        years: Array1::from(out_years),
        values: Array1::from(out_values),
    })
}

pub fn calc_yearly_sum(years: ArrayView1<i32>, values: ArrayView1<f64>) -> Result<YearlySeries> {
    calc_yearly(years, values, Aggregate::Sum)
}

pub fn calc_yearly_mean(years: ArrayView1<i32>, values: ArrayView1<f64>) -> Result<YearlySeries> {
    calc_yearly(years, values, Aggregate::Mean)
}

/// Liquid precipitation: total precipitation on days whose mean air
/// temperature is at least `tcrit`, zero otherwise.
pub fn rain_from_ptot(
    tavg: ArrayView1<f64>,
    ptot: ArrayView1<f64>,
    tcrit: f64,
) -> Result<Array1<f64>> {
    check_lengths(&[tavg.len(), ptot.len()])?;

    Ok(tavg
        .iter()
        .zip(ptot.iter())
        .map(|(t, p)| if *t < tcrit { 0.0 } else { *p })
        .collect())
}

#[cfg(test)]
mod test {
    use {
        super::*,
        approx::assert_abs_diff_eq,
        chrono::{Datelike, NaiveDate},
        ndarray::arr1,
    };

    /// Daily series of one value per day for the given years.
    fn daily(first: i32, last: i32) -> (Array1<i32>, Array1<u32>, Array1<f64>) {
        let mut years = Vec::new();
        let mut months = Vec::new();
        for year in first..=last {
            let mut date = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
            while date.year() == year {
                years.push(date.year());
                months.push(date.month());
                date = date.succ_opt().unwrap();
            }
        }
        let values = Array1::ones(years.len());
        (Array1::from(years), Array1::from(months), values)
    }

    #[test]
    fn monthly_sums_count_days() {
        let (years, months, values) = daily(2003, 2004);
        let monthly = calc_monthly_sum(years.view(), months.view(), values.view()).unwrap();

        assert_eq!(monthly.values.len(), 24);
        assert_eq!(monthly.years[12], 2004);
        assert_eq!(monthly.months[13], 2);
        assert_abs_diff_eq!(monthly.values[1], 28.0);
        assert_abs_diff_eq!(monthly.values[13], 29.0);
        assert_abs_diff_eq!(monthly.values[23], 31.0);
    }

    #[test]
    fn incomplete_month_is_nan() {
        let (years, months, values) = daily(2003, 2003);
        let n = years.len() - 1;
        let monthly = calc_monthly_mean(
            years.slice(ndarray::s![..n]),
            months.slice(ndarray::s![..n]),
            values.slice(ndarray::s![..n]),
        )
        .unwrap();

        assert_abs_diff_eq!(monthly.values[10], 1.0);
        assert!(monthly.values[11].is_nan());
    }

    #[test]
    fn normals_skip_nan_and_out_of_range_years() {
        let years = arr1(&[2000, 2000, 2001, 2001, 2002]);
        let months = arr1(&[1, 2, 1, 2, 1]);
        let values = arr1(&[10.0, f64::NAN, 20.0, 4.0, 90.0]);

        let normals =
            calc_monthly_normals(years.view(), months.view(), values.view(), None, Some(2001))
                .unwrap();

        assert_eq!(normals.len(), 12);
        assert_abs_diff_eq!(normals[0], 15.0);
        assert_abs_diff_eq!(normals[1], 4.0);
        assert!(normals[2].is_nan());

        let normals =
            calc_monthly_normals(years.view(), months.view(), values.view(), Some(2001), None)
                .unwrap();
        assert_abs_diff_eq!(normals[0], 55.0);
    }

    #[test]
    fn normals_reject_bad_input() {
        let years = arr1(&[2000, 2000]);

        assert!(calc_monthly_normals(
            years.view(),
            arr1(&[1, 13]).view(),
            arr1(&[1.0, 1.0]).view(),
            None,
            None
        )
        .is_err());
        assert!(calc_monthly_normals(
            years.view(),
            arr1(&[1]).view(),
            arr1(&[1.0, 1.0]).view(),
            None,
            None
        )
        .is_err());
    }

    #[test]
    fn yearly() {
        let (years, _, values) = daily(2003, 2004);

        let sums = calc_yearly_sum(years.view(), values.view()).unwrap();
        assert_eq!(sums.years, arr1(&[2003, 2004]));
        assert_eq!(sums.values, arr1(&[365.0, 366.0]));

        let means = calc_yearly_mean(years.view(), values.view()).unwrap();
        assert_eq!(means.values, arr1(&[1.0, 1.0]));
    }

    #[test]
    fn rain_is_zero_below_critical_temperature() {
        let tavg = arr1(&[-5.0, 0.0, 3.0]);
        let ptot = arr1(&[2.0, 3.0, 4.0]);

        assert_eq!(
            rain_from_ptot(tavg.view(), ptot.view(), 0.0).unwrap(),
            arr1(&[0.0, 3.0, 4.0])
        );
        assert!(rain_from_ptot(tavg.view(), arr1(&[1.0]).view(), 0.0).is_err());
    }
}
