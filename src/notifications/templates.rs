use crate::scoring::Scorecard;

pub struct NotificationTemplates;

impl NotificationTemplates {
    /// HTML email for a freshly scored video.
    pub fn score_report_email(
        owner_name: &str,
        sport: &str,
        card: &Scorecard,
        scored_at: &str,
    ) -> String {
        let recommendations_html = card
            .recommendations
            .iter()
            .map(|r| format!("<li>{}</li>", r))
            .collect::<Vec<_>>()
            .join("");

        let confidence_note = if card.low_confidence {
            "<p><em>Footage quality limited confidence in this analysis; a longer or steadier clip will sharpen the read.</em></p>"
        } else {
            ""
        };

        format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <style>
        body {{ font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 8px; }}
        .header {{ background-color: #dfe6e9; padding: 15px; border-radius: 8px 8px 0 0; text-align: center; }}
        .header h1 {{ margin: 0; color: #2d3436; }}
        .score-badge {{ background-color: #0984e3; color: white; padding: 8px 16px; border-radius: 4px; font-size: 24px; font-weight: bold; display: inline-block; margin-top: 10px; }}
        .content {{ padding: 20px; }}
        .section {{ margin-bottom: 20px; }}
        .section h3 {{ border-bottom: 2px solid #eee; padding-bottom: 5px; color: #636e72; }}
        .dims td {{ padding: 4px 12px 4px 0; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #b2bec3; text-align: center; }}
        ul {{ padding-left: 20px; }}
        li {{ margin-bottom: 5px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Your GAR Score Is Ready</h1>
            <div class="score-badge">{overall:.1}</div>
        </div>
        <div class="content">
            <p><strong>{owner_name}</strong>, your {sport} clip finished analysis on {scored_at}.</p>
            <p>{feedback}</p>
            {confidence_note}

            <div class="section">
                <h3>Dimension Breakdown</h3>
                <table class="dims">
                    <tr><td>Technical</td><td><strong>{technical:.1}</strong></td></tr>
                    <tr><td>Physical</td><td><strong>{physical:.1}</strong></td></tr>
                    <tr><td>Tactical</td><td><strong>{tactical:.1}</strong></td></tr>
                    <tr><td>Mental</td><td><strong>{mental:.1}</strong></td></tr>
                </table>
            </div>

            <div class="section">
                <h3>Recommended Next Steps</h3>
                <ul>
                    {recommendations_html}
                </ul>
            </div>
        </div>
        <div class="footer">
            <p>Sent by the GAR Analysis Service</p>
        </div>
    </div>
</body>
</html>
"#,
            overall = card.overall,
            owner_name = owner_name,
            sport = sport,
            scored_at = scored_at,
            feedback = card.feedback,
            confidence_note = confidence_note,
            technical = card.technical,
            physical = card.physical,
            tactical = card.tactical,
            mental = card.mental,
            recommendations_html = recommendations_html,
        )
    }

    /// Concise SMS with the composite score.
    pub fn score_report_sms(sport: &str, card: &Scorecard) -> String {
        format!(
            "GAR score ready: {:.1} overall for your {} clip (T {:.0} / P {:.0} / Ta {:.0} / M {:.0})",
            card.overall, sport, card.technical, card.physical, card.tactical, card.mental
        )
    }

    pub fn analysis_failed_email(owner_name: &str, sport: &str, reason: &str) -> String {
        format!(
            r#"
<!DOCTYPE html>
<html>
<body style="font-family: Helvetica, Arial, sans-serif; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2>We couldn't analyze your video</h2>
        <p>{owner_name}, your {sport} upload could not be scored.</p>
        <p><strong>Reason:</strong> {reason}</p>
        <p>You can upload a new clip at any time; mp4, mov, webm and mkv files work best.</p>
    </div>
</body>
</html>
"#,
            owner_name = owner_name,
            sport = sport,
            reason = reason,
        )
    }

    pub fn analysis_failed_sms(sport: &str, reason: &str) -> String {
        // Keep it under one segment where possible
        let short_reason = if reason.len() > 80 {
            format!("{}...", &reason[..77])
        } else {
            reason.to_string()
        };
        format!("Your {} video could not be scored: {}", sport, short_reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::MODEL_VERSION;

    fn card() -> Scorecard {
        Scorecard {
            overall: 72.5,
            technical: 68.0,
            physical: 80.2,
            tactical: 66.1,
            mental: 77.7,
            low_confidence: true,
            feedback: "Solid basketball performance.".to_string(),
            recommendations: vec!["Work on tactical awareness and positioning".to_string()],
            model_version: MODEL_VERSION.to_string(),
        }
    }

    #[test]
    fn email_includes_scores_and_recommendations() {
        let html = NotificationTemplates::score_report_email("Dana", "basketball", &card(), "2026-04-20 10:00");
        assert!(html.contains("72.5"));
        assert!(html.contains("tactical awareness"));
        assert!(html.contains("limited confidence"));
    }

    #[test]
    fn sms_is_single_line() {
        let sms = NotificationTemplates::score_report_sms("soccer", &card());
        assert!(!sms.contains('\n'));
        assert!(sms.contains("72.5"));
    }
}
