// Prevalence covariates — the regression of topic proportions on document
// metadata.
//
// The design matrix holds an intercept, a truncated-power cubic spline basis
// over day-of-year (the smooth continuous effect), and drop-first indicator
// columns for organisation (the categorical effect). The fit is ridge least
// squares on small dense matrices; the inverse normal matrix is kept so
// effect queries can report confidence bounds.

use serde::{Deserialize, Serialize};

use crate::config::PrevalenceSpec;
use crate::corpus::document::Document;
use crate::error::{PipelineError, Result};

/// Covariates an effect can be estimated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Covariate {
    DayOfYear,
    Organisation,
}

/// One point of an estimated prevalence effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectPoint {
    /// Day of year for a continuous effect; level index for a categorical one.
    pub x: f64,
    /// Organisation name for a categorical effect.
    pub label: Option<String>,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A continuous prevalence curve (or categorical point set) with confidence
/// bounds for one topic and covariate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectCurve {
    pub topic: usize,
    pub covariate: Covariate,
    pub points: Vec<EffectPoint>,
}

/// Design matrix built once per corpus.
#[derive(Debug, Clone)]
pub struct PrevalenceDesign {
    pub names: Vec<String>,
    rows: Vec<Vec<f64>>,
    knots: Vec<f64>,
    use_day: bool,
    /// Organisation levels in first-encountered order; the first is the
    /// baseline absorbed by the intercept.
    orgs: Vec<String>,
}

impl PrevalenceDesign {
    pub fn build(documents: &[Document], spec: &PrevalenceSpec) -> Self {
        let knots: Vec<f64> = if spec.day_of_year {
            (1..=spec.spline_knots)
                .map(|j| j as f64 / (spec.spline_knots + 1) as f64)
                .collect()
        } else {
            Vec::new()
        };

        let mut orgs: Vec<String> = Vec::new();
        if spec.organisation {
            for doc in documents {
                if !orgs.contains(&doc.organisation) {
                    orgs.push(doc.organisation.clone());
                }
            }
        }

        let mut names = vec!["intercept".to_string()];
        if spec.day_of_year {
            names.extend(["day".to_string(), "day^2".to_string(), "day^3".to_string()]);
            for (j, _) in knots.iter().enumerate() {
                names.push(format!("day_knot{}", j + 1));
            }
        }
        for org in orgs.iter().skip(1) {
            names.push(format!("org:{org}"));
        }

        let design = Self {
            names,
            rows: Vec::new(),
            knots,
            use_day: spec.day_of_year,
            orgs,
        };

        let rows = documents
            .iter()
            .map(|d| design.row_for(d.day_of_year as f64, Some(&d.organisation)))
            .collect();

        Self { rows, ..design }
    }

    pub fn p(&self) -> usize {
        self.names.len()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, doc: usize) -> &[f64] {
        &self.rows[doc]
    }

    pub fn organisations(&self) -> &[String] {
        &self.orgs
    }

    /// Design row for an arbitrary covariate setting. `org = None` means the
    /// baseline level.
    pub fn row_for(&self, day_of_year: f64, org: Option<&str>) -> Vec<f64> {
        let mut row = vec![1.0];
        if self.use_day {
            let t = day_of_year / 366.0;
            row.push(t);
            row.push(t * t);
            row.push(t * t * t);
            for &knot in &self.knots {
                let d = (t - knot).max(0.0);
                row.push(d * d * d);
            }
        }
        for level in self.orgs.iter().skip(1) {
            row.push(if Some(level.as_str()) == org { 1.0 } else { 0.0 });
        }
        row
    }
}

/// Fitted prevalence regression: per-topic coefficients plus what is needed
/// for standard errors.
#[derive(Debug, Clone)]
pub struct PrevalenceFit {
    pub design: PrevalenceDesign,
    /// K × p coefficient matrix.
    pub coef: Vec<Vec<f64>>,
    /// Residual variance per topic.
    pub residual_var: Vec<f64>,
    /// (X'X + λI)⁻¹, shared across topics.
    xtx_inv: Vec<Vec<f64>>,
}

impl PrevalenceFit {
    /// Ridge-regress each topic's proportion column on the design.
    pub fn fit(design: PrevalenceDesign, doc_topic: &[Vec<f64>], ridge: f64) -> Result<Self> {
        let n = design.n_rows();
        let p = design.p();
        let k = doc_topic.first().map_or(0, Vec::len);

        let mut xtx = vec![vec![0.0f64; p]; p];
        for d in 0..n {
            let x = design.row(d);
            for i in 0..p {
                for j in 0..p {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }
        for (i, row) in xtx.iter_mut().enumerate() {
            row[i] += ridge;
        }

        let xtx_inv = invert(&xtx).ok_or_else(|| {
            PipelineError::InvalidConfig("singular prevalence design matrix".into())
        })?;

        let mut coef = Vec::with_capacity(k);
        let mut residual_var = Vec::with_capacity(k);
        for t in 0..k {
            let mut xty = vec![0.0f64; p];
            for d in 0..n {
                let x = design.row(d);
                for i in 0..p {
                    xty[i] += x[i] * doc_topic[d][t];
                }
            }
            let beta: Vec<f64> = (0..p)
                .map(|i| (0..p).map(|j| xtx_inv[i][j] * xty[j]).sum())
                .collect();

            let mut rss = 0.0;
            for d in 0..n {
                let x = design.row(d);
                let fitted: f64 = x.iter().zip(&beta).map(|(a, b)| a * b).sum();
                let r = doc_topic[d][t] - fitted;
                rss += r * r;
            }
            let df = (n.saturating_sub(p)).max(1) as f64;
            residual_var.push(rss / df);
            coef.push(beta);
        }

        Ok(Self {
            design,
            coef,
            residual_var,
            xtx_inv,
        })
    }

    /// Predicted topic proportions for one design row, floored and
    /// renormalized so they can serve as a Dirichlet mean.
    pub fn predicted_proportions(&self, x: &[f64]) -> Vec<f64> {
        let mut mu: Vec<f64> = self
            .coef
            .iter()
            .map(|beta| {
                let fitted: f64 = x.iter().zip(beta).map(|(a, b)| a * b).sum();
                fitted.max(1e-4)
            })
            .collect();
        let total: f64 = mu.iter().sum();
        for v in &mut mu {
            *v /= total;
        }
        mu
    }

    /// Estimate ± 1.96·SE at one design row for one topic.
    fn point(&self, topic: usize, x: &[f64]) -> (f64, f64) {
        let beta = &self.coef[topic];
        let estimate: f64 = x.iter().zip(beta).map(|(a, b)| a * b).sum();
        let p = x.len();
        let mut quad = 0.0;
        for i in 0..p {
            for j in 0..p {
                quad += x[i] * self.xtx_inv[i][j] * x[j];
            }
        }
        let se = (self.residual_var[topic] * quad).max(0.0).sqrt();
        (estimate, se)
    }

    /// Continuous prevalence curve (day-of-year grid at the baseline
    /// organisation) or per-organisation estimates (at mid-year), with
    /// 95% confidence bounds.
    pub fn effect(&self, topic: usize, covariate: Covariate) -> Result<EffectCurve> {
        if topic >= self.coef.len() {
            return Err(PipelineError::IndexOutOfRange {
                index: topic,
                len: self.coef.len(),
            });
        }

        let points = match covariate {
            Covariate::DayOfYear => (1..=366)
                .step_by(5)
                .map(|day| {
                    let x = self.design.row_for(day as f64, None);
                    let (estimate, se) = self.point(topic, &x);
                    EffectPoint {
                        x: day as f64,
                        label: None,
                        estimate,
                        lower: estimate - 1.96 * se,
                        upper: estimate + 1.96 * se,
                    }
                })
                .collect(),
            Covariate::Organisation => self
                .design
                .organisations()
                .iter()
                .enumerate()
                .map(|(i, org)| {
                    let x = self.design.row_for(183.0, Some(org));
                    let (estimate, se) = self.point(topic, &x);
                    EffectPoint {
                        x: i as f64,
                        label: Some(org.clone()),
                        estimate,
                        lower: estimate - 1.96 * se,
                        upper: estimate + 1.96 * se,
                    }
                })
                .collect(),
        };

        Ok(EffectCurve {
            topic,
            covariate,
            points,
        })
    }
}

/// Gauss-Jordan inverse with partial pivoting. Fine at prevalence-design
/// sizes (a handful of columns).
fn invert(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);

        let scale = a[col][col];
        for j in 0..n {
            a[col][j] /= scale;
            inv[col][j] /= scale;
        }
        for i in 0..n {
            if i == col {
                continue;
            }
            let factor = a[i][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[i][j] -= factor * a[col][j];
                inv[i][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn doc(id: usize, org: &str, day: u16) -> Document {
        Document {
            id,
            organisation: org.to_string(),
            title: String::new(),
            date: NaiveDate::from_yo_opt(2020, day as u32).unwrap(),
            day_of_year: day,
            text: String::new(),
        }
    }

    fn spec() -> PrevalenceSpec {
        PrevalenceSpec {
            day_of_year: true,
            spline_knots: 2,
            organisation: true,
            ridge: 0.1,
        }
    }

    #[test]
    fn design_has_expected_columns() {
        let docs = vec![doc(0, "A", 10), doc(1, "B", 200), doc(2, "A", 300)];
        let design = PrevalenceDesign::build(&docs, &spec());
        // intercept + day,day^2,day^3 + 2 knots + 1 non-baseline org
        assert_eq!(design.p(), 1 + 3 + 2 + 1);
        assert_eq!(design.n_rows(), 3);
        assert!(design.names.contains(&"org:B".to_string()));
        assert!(!design.names.iter().any(|n| n == "org:A"));
    }

    #[test]
    fn spline_columns_are_monotone_inputs() {
        let docs = vec![doc(0, "A", 1), doc(1, "A", 366)];
        let design = PrevalenceDesign::build(&docs, &spec());
        let early = design.row(0);
        let late = design.row(1);
        // All day-derived columns grow with the day.
        for j in 1..=5 {
            assert!(late[j] >= early[j]);
        }
    }

    #[test]
    fn invert_recovers_identity() {
        let m = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let inv = invert(&m).unwrap();
        // m * inv = I
        for i in 0..2 {
            for j in 0..2 {
                let cell: f64 = (0..2).map(|k| m[i][k] * inv[k][j]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((cell - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn singular_matrix_returns_none() {
        let m = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(invert(&m).is_none());
    }

    #[test]
    fn fit_recovers_constant_proportions() {
        let docs: Vec<Document> = (0..20)
            .map(|i| doc(i, if i % 2 == 0 { "A" } else { "B" }, (i as u16) * 18 + 1))
            .collect();
        let design = PrevalenceDesign::build(&docs, &spec());
        // Every document has the same topic mix; the fitted intercept should
        // dominate and predictions should come back near the truth.
        let doc_topic: Vec<Vec<f64>> = (0..20).map(|_| vec![0.7, 0.3]).collect();
        let fit = PrevalenceFit::fit(design, &doc_topic, 0.1).unwrap();
        let x = fit.design.row_for(100.0, None);
        let mu = fit.predicted_proportions(&x);
        assert!((mu[0] - 0.7).abs() < 0.1, "got {}", mu[0]);
        assert!((mu.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn effect_rejects_out_of_range_topic() {
        let docs: Vec<Document> = (0..10).map(|i| doc(i, "A", (i as u16) * 30 + 1)).collect();
        let design = PrevalenceDesign::build(&docs, &spec());
        let doc_topic: Vec<Vec<f64>> = (0..10).map(|_| vec![0.5, 0.5]).collect();
        let fit = PrevalenceFit::fit(design, &doc_topic, 0.1).unwrap();
        assert!(matches!(
            fit.effect(5, Covariate::DayOfYear),
            Err(PipelineError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn effect_curve_bounds_bracket_estimate() {
        let docs: Vec<Document> = (0..12).map(|i| doc(i, "A", (i as u16) * 30 + 1)).collect();
        let design = PrevalenceDesign::build(&docs, &spec());
        let doc_topic: Vec<Vec<f64>> = (0..12)
            .map(|i| {
                let t = i as f64 / 11.0;
                vec![0.3 + 0.4 * t, 0.7 - 0.4 * t]
            })
            .collect();
        let fit = PrevalenceFit::fit(design, &doc_topic, 0.1).unwrap();
        let curve = fit.effect(0, Covariate::DayOfYear).unwrap();
        assert!(!curve.points.is_empty());
        for p in &curve.points {
            assert!(p.lower <= p.estimate && p.estimate <= p.upper);
        }
    }
}
