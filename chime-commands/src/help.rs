pub const HELP_TEXT: &str = "\
*Available commands*

_list reminders_
/remindlist

_get details of a reminder_
/r_ID

_delete a reminder_
/reminddelete_ID

_finish a repeating reminder_
/complete ID

_snooze a reminder_
/snooze ID 10m|20m|30m|1h|afternoon|evening|tomorrow|tomorrow-afternoon|tomorrow-evening

_remove completed reminders_
/removecompleted

_set a reminder_
/remind me on the 1st of december Update your report
/remind me on the 1st of december at 8:23 Update your report
/remind me tonight/this evening/tomorrow/tomorrow morning Update your report
/remind me today/tomorrow at 21:00 Update your report
/remind me on Tuesday at 22:00 Update your report
/remind me at 21:00 Update your report
/remind me in 5 days, 3 hours, 4 minutes Update your report
/remind me in 4 minutes Update your report

_set a recurring reminder_
/remind me every 1st of december at 8:23 Update yearly report
/remind me every 1st of the month Update monthly report
/remind me every Tuesday at 22:00 Update weekly report
/remind me every weekday at 9 Standup
/remind me every day at 8pm Update daily report
/remind me every 3 hours, 4 minutes Update your report

_set timezone for chat reminders_
/gettimezone
/settimezone Asia/Ho_Chi_Minh
";
